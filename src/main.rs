use scriptpool::cli::CliOverrides;
use scriptpool::config::HostConfig;

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    let config_path = cli.config_path().map(str::to_string);
    let mut config = match config_path {
        Some(path) => HostConfig::load_or_default(path),
        None => HostConfig::default(),
    };
    config.apply_overrides(&cli.into_config_overrides());

    match scriptpool::run(&config) {
        Ok(summary) => {
            println!(
                "[host] done: {} objects updated across {} workers",
                summary.total_objects(),
                summary.reports.len()
            );
        }
        Err(err) => {
            eprintln!("[host] fatal: {err:?}");
            std::process::exit(1);
        }
    }
}
