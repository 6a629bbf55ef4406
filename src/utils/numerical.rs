use log::debug;
use ndarray::prelude::*;

/// Parameters of Ridders' extrapolation of central differences.
///
/// C. J. F. Ridders, ["Accurate computation of F′(x) and F′(x) F″(x)"](https://doi.org/10.1016/S0141-1195(82)80057-0),
/// Adv. Eng. Softw. 4, 75 (1982), in the form given in Numerical Recipes.
#[derive(Debug, Clone, Copy)]
pub struct Ridders {
    /// Factor by which the step shrinks between two rows of the tableau
    pub con: f64,
    /// Stop once the highest order is worse than the best estimate by this factor
    pub safe: f64,
    /// Largest number of rows of the tableau
    pub max_order: usize,
}

impl Default for Ridders {
    fn default() -> Self {
        Ridders {
            con: 1.4,
            safe: 2.0,
            max_order: 15,
        }
    }
}

impl Ridders {
    /// Derivative of `function` at `origin` along the coordinate `index`, starting from the
    /// step `stepsize`. Returns the estimate and its error.
    pub fn derivative<F, D>(
        &self,
        function: F,
        origin: ArrayBase<D, Ix1>,
        index: usize,
        stepsize: f64,
    ) -> (f64, f64)
    where
        F: Fn(Array1<f64>) -> f64,
        D: ndarray::Data<Elem = f64>,
    {
        let mut direction: Array1<f64> = Array1::zeros(origin.len());
        direction[index] = 1.0;
        let central = |h: f64| -> f64 {
            let shift: Array1<f64> = &direction * h;
            (function(&origin + &shift) - function(&origin - &shift)) / (2.0 * h)
        };

        let order: usize = self.max_order.max(2);
        let con2: f64 = self.con * self.con;
        let mut tableau: Array2<f64> = Array2::zeros((order, order));
        let mut h: f64 = stepsize;
        tableau[[0, 0]] = central(h);
        let mut estimate: f64 = tableau[[0, 0]];
        let mut error: f64 = f64::MAX;

        for i in 1..order {
            h /= self.con;
            tableau[[i, 0]] = central(h);
            let mut factor: f64 = con2;
            for j in 1..=i {
                tableau[[i, j]] =
                    (tableau[[i, j - 1]] * factor - tableau[[i - 1, j - 1]]) / (factor - 1.0);
                factor *= con2;
                let row_error: f64 = (tableau[[i, j]] - tableau[[i, j - 1]])
                    .abs()
                    .max((tableau[[i, j]] - tableau[[i - 1, j - 1]]).abs());
                if row_error <= error {
                    error = row_error;
                    estimate = tableau[[i, j]];
                }
            }
            if (tableau[[i, i]] - tableau[[i - 1, i - 1]]).abs() >= self.safe * error {
                break;
            }
        }
        (estimate, error)
    }
}

/// Compare `gradient` with Ridders' finite differences of `function` at `origin` and panic if
/// any component deviates by more than `tol`, relative to the numerical derivative (absolute
/// below one). The comparison table is logged at debug level.
pub fn assert_deriv<F, G>(function: F, gradient: G, origin: Array1<f64>, stepsize: f64, tol: f64)
where
    F: Fn(Array1<f64>) -> f64,
    G: Fn(Array1<f64>) -> Array1<f64>,
{
    assert!(stepsize > 0.0, "step size has to be positive, got {}", stepsize);
    let ridders: Ridders = Ridders::default();
    let analytic: Array1<f64> = gradient(origin.clone());

    debug!(
        "{: <5} {: >18} {: >18} {: >18}",
        "Index", "Analytic", "Numerical", "Error"
    );
    let failed: Vec<usize> = (0..origin.len())
        .filter(|i| {
            let (numerical, error): (f64, f64) =
                ridders.derivative(&function, origin.view(), *i, stepsize);
            debug!(
                "{: >5} {:>18.12} {:>18.12} {:>18.3e}",
                i, analytic[*i], numerical, error
            );
            (analytic[*i] - numerical).abs() > tol * numerical.abs().max(1.0)
        })
        .collect();
    assert!(
        failed.is_empty(),
        "Gradient test failed for the components {:?}",
        failed
    );
}
