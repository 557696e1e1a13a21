fn main() {
    if handle_cli_flags() {
        return;
    }

    let username = match aggr_cli::app::parse_username(std::env::args().skip(1)) {
        Ok(username) => username,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let _ = aggr_cli::logging::init();

    if let Err(err) = aggr_cli::run(&username) {
        tracing::error!(error = ?err, "aggr failed");
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("aggr {}", aggr_cli::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "aggr — Read an aggr.md feed from the terminal.\n\nUsage: aggr @username\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
