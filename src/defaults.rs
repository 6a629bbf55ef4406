// PROJECTOR CONTRIBUTION
// config file
pub const CONFIG_FILE_NAME: &str = "ppnl.toml";
// contributions of a bridge site are skipped if the product of the
// magnitude bounds of both cached tensors is below this value
pub const EPS_PPNL: f64 = 1.0e-12;
// the radial extent of a shell is the distance at which its most diffuse
// primitive drops below this value
pub const EPS_RADIUS: f64 = 1.0e-10;
// forces and virial are only accumulated on request
pub const CALCULATE_FORCES: bool = false;
pub const USE_VIRIAL: bool = false;
// number of worker threads, 0 uses the rayon default (number of cores)
pub const N_THREADS: usize = 0;
pub const VERBOSE: i8 = 0;

// RADIUS SEARCH
// upper bound (bohr) for the root search of a shell radius
pub const MAX_SHELL_RADIUS: f64 = 100.0;
pub const RADIUS_TOLERANCE: f64 = 1.0e-8;
pub const RADIUS_MAX_ITER: usize = 100;

// coupling matrices have to be symmetric within this tolerance
pub const SYMMETRY_TOLERANCE: f64 = 1.0e-12;
