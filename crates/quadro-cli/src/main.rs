use std::ffi::OsString;

use quadro_core::error::AlreadyReported;

fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    if let Err(err) = quadro_core::run(args) {
        if err.downcast_ref::<AlreadyReported>().is_none() {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
}
