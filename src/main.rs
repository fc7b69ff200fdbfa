#[cfg(not(feature = "simulator"))]
fn main() {
    eprintln!(
        "textoverlay-sim requires the \"simulator\" feature. Rebuild with `--features simulator` to run scenarios."
    );
}

#[cfg(feature = "simulator")]
mod cli {
    use anyhow::Context;
    use std::env;

    use textoverlay::sim::Scenario;

    const USAGE: &str = "Usage:\n  textoverlay-sim [options] <scenario.json>\n\nOptions:\n  --frames <n>       Override the number of video frames\n  --attach           Attach overlays instead of blending them\n  --disconnected     Run without a text input (default text only)\n  --print-scenario   Print the effective scenario as JSON and exit\n  -h, --help         Show this help\n\nLogging is controlled with RUST_LOG (default: info).\n";

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let mut file_arg: Option<String> = None;
        let mut frames: Option<u32> = None;
        let mut attach = false;
        let mut disconnected = false;
        let mut print_scenario = false;
        let mut show_help = false;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => show_help = true,
                "--attach" => attach = true,
                "--disconnected" => disconnected = true,
                "--print-scenario" => print_scenario = true,
                "--frames" => {
                    let value = args.next().context("--frames requires a number")?;
                    frames = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid frame count '{value}'"))?,
                    );
                }
                _ if arg.starts_with("--frames=") => {
                    let value = &arg["--frames=".len()..];
                    frames = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid frame count '{value}'"))?,
                    );
                }
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {arg}");
                    show_help = true;
                }
                _ => file_arg = Some(arg),
            }
        }

        let Some(path) = file_arg.filter(|_| !show_help) else {
            eprint!("{USAGE}");
            return Ok(());
        };

        let mut scenario = Scenario::load(&path)
            .with_context(|| format!("failed to load scenario '{path}'"))?;
        if let Some(frames) = frames {
            scenario.frames = frames;
        }
        scenario.attach |= attach;
        if disconnected {
            scenario.connected = false;
        }

        if print_scenario {
            println!("{}", serde_json::to_string_pretty(&scenario)?);
            return Ok(());
        }

        log::info!(
            "playing {} frames of {:?} {}x{} at {}/{} fps, {} cues",
            scenario.frames,
            scenario.format,
            scenario.width,
            scenario.height,
            scenario.fps_n,
            scenario.fps_d,
            scenario.cues.len()
        );

        let report = scenario.run().context("simulation failed")?;
        println!("{report}");
        Ok(())
    }
}

#[cfg(feature = "simulator")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
