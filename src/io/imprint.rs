use log::info;

/// Banner with the version of the crate, printed once per build at high verbosity.
pub fn write_header() {
    info!("{: ^80}", "-----------------");
    info!("{: ^80}", "PPNL");
    info!("{: ^80}", "-----------------");
    let mut version_string: String = "version: ".to_owned();
    version_string.push_str(env!("CARGO_PKG_VERSION"));
    info!("{: ^80}", version_string);
    info!("{: ^80}", "");
    info!("{: ^80}", "::::::::::::::::::::::::::::::::::::::::::");
    info!("{: ^80}", "::  nonlocal projector matrix elements  ::");
    info!("{: ^80}", "::  three-center contraction and forces ::");
    info!("{: ^80}", "::::::::::::::::::::::::::::::::::::::::::");
    info!("{: ^80}", "");
}
