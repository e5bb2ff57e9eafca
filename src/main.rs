use commenter_wall::app::RunOptions;

fn main() {
    let options = match parse_args() {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = commenter_wall::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Option<RunOptions>, String> {
    let mut options = RunOptions::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("commenter-wall {}", commenter_wall::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!(
                    "commenter-wall — Watch a project's comment feed and surface new commenters.\n\n  --project <id>       Project to watch (overrides config)\n  --once               Render the current commenter list and exit\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                return Ok(None);
            }
            "--once" => {
                options.once = true;
            }
            "--project" => {
                let value = args.next().ok_or("--project requires a value")?;
                options.project = Some(value);
            }
            other => {
                return Err(format!("unknown argument {other:?} (try --help)"));
            }
        }
    }

    Ok(Some(options))
}
