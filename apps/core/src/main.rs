use std::panic::AssertUnwindSafe;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match quickmenu_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[quickmenu] {error}");
            eprintln!("{}", quickmenu_core::runtime::USAGE);
            std::process::exit(1);
        }
    };

    if options.help {
        println!("{}", quickmenu_core::runtime::USAGE);
        return;
    }

    // The panic hook has already logged any panic detail; the boundary
    // only has to turn it into the unknown-error exit code.
    let code = match std::panic::catch_unwind(AssertUnwindSafe(|| {
        quickmenu_core::runtime::run_with_options(options)
    })) {
        Ok(Ok(code)) => code,
        Ok(Err(error)) => {
            eprintln!("[quickmenu] runtime failed: {error}");
            1
        }
        Err(_) => 1,
    };
    std::process::exit(code);
}
