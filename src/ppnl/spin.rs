//! Transformation of spin resolved density matrices into the total and the difference density
//! and back.
use crate::errors::PpnlError;
use crate::matrix::BlockSparseMatrix;

fn split_channels(
    density: &mut [BlockSparseMatrix],
) -> Result<(&mut BlockSparseMatrix, &mut BlockSparseMatrix), PpnlError> {
    if density.len() != 2 {
        return Err(PpnlError::InvalidParameter(format!(
            "expected two spin channels but found {}",
            density.len()
        )));
    }
    let (alpha, beta) = density.split_at_mut(1);
    Ok((&mut alpha[0], &mut beta[0]))
}

/// `(alpha, beta) -> (alpha + beta, alpha - beta)`
pub fn decombine(density: &mut [BlockSparseMatrix]) -> Result<(), PpnlError> {
    let (alpha, beta) = split_channels(density)?;
    alpha.add_scaled(beta, 1.0)?;
    beta.scale(-2.0);
    beta.add_scaled(alpha, 1.0)?;
    Ok(())
}

/// `(total, difference) -> ((total + difference) / 2, total - alpha)`
pub fn recombine(density: &mut [BlockSparseMatrix]) -> Result<(), PpnlError> {
    let (total, difference) = split_channels(density)?;
    total.add_scaled(difference, 1.0)?;
    total.scale(0.5);
    difference.scale(-1.0);
    difference.add_scaled(total, 1.0)?;
    Ok(())
}
