use crate::{Error, Result};

/// Options for the `run` command; values are `None` when not provided on CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub device: Option<String>,
    pub baud: Option<u32>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub demo: bool,
}

/// Options for `preview`: composite one packed bitmap file and print it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    pub bitmap: String,
    pub image_width: u32,
    pub image_height: u32,
    pub caption: String,
    pub width: Option<u16>,
    pub height: Option<u16>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Preview(PreviewOptions),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Command::Run(RunOptions::default()));
        }

        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            Some("run") => Ok(Command::Run(parse_run_options(&mut iter)?)),
            Some("preview") => Ok(Command::Preview(parse_preview_options(&mut iter)?)),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // No explicit `run`: hand every arg, including this flag, to the run parser.
                let mut iter = args.iter();
                Ok(Command::Run(parse_run_options(&mut iter)?))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
            None => Ok(Command::Run(RunOptions::default())),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "inklink - BLE-UART badge receiver for e-paper panels\n",
            "\n",
            "USAGE:\n",
            "  inklink run [--device <path>] [--baud <number>] [--width <px>] [--height <px>]\n",
            "              [--log-level <level>] [--log-file <path>] [--demo]\n",
            "  inklink preview --bitmap <file> --size <W>x<H> [--caption <text>] [--width <px>] [--height <px>]\n",
            "  inklink --help\n",
            "  inklink --version\n",
            "\n",
            "OPTIONS:\n",
            "  --device <path>     BLE-UART bridge serial device (default: /dev/ttyUSB0)\n",
            "  --baud <number>     Baud rate (default: 9600)\n",
            "  --width <px>        Panel width in pixels (default: 250)\n",
            "  --height <px>       Panel height in pixels (default: 122)\n",
            "  --log-level <lvl>   error|warn|info|debug|trace (default: info)\n",
            "  --log-file <path>   Append logs to this file as well as stderr\n",
            "  --demo              Run against a scripted link instead of the device\n",
            "  --bitmap <file>     Packed 1bpp bitmap (MSB first, 1 = dark) for preview\n",
            "  --size <W>x<H>      Pixel size of the bitmap file\n",
            "  --caption <text>    Caption drawn next to the previewed image\n",
            "  -h, --help          Show this help\n",
            "  -V, --version       Show version\n",
            "\n",
            "Settings not given on the command line come from ~/.inklink/config.toml.\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--device" => {
                opts.device = Some(take_value(flag, iter)?);
            }
            "--baud" => {
                opts.baud = Some(parse_number(flag, &take_value(flag, iter)?)?);
            }
            "--width" => {
                opts.width = Some(parse_number(flag, &take_value(flag, iter)?)?);
            }
            "--height" => {
                opts.height = Some(parse_number(flag, &take_value(flag, iter)?)?);
            }
            "--log-level" => {
                opts.log_level = Some(take_value(flag, iter)?);
            }
            "--log-file" => {
                opts.log_file = Some(take_value(flag, iter)?);
            }
            "--demo" => {
                opts.demo = true;
            }
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn parse_preview_options(iter: &mut std::slice::Iter<String>) -> Result<PreviewOptions> {
    let mut bitmap = None;
    let mut size = None;
    let mut caption = String::new();
    let mut width = None;
    let mut height = None;

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--bitmap" => bitmap = Some(take_value(flag, iter)?),
            "--size" => size = Some(parse_size(&take_value(flag, iter)?)?),
            "--caption" => caption = take_value(flag, iter)?,
            "--width" => width = Some(parse_number(flag, &take_value(flag, iter)?)?),
            "--height" => height = Some(parse_number(flag, &take_value(flag, iter)?)?),
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown preview flag '{other}', try --help"
                )));
            }
        }
    }

    let bitmap =
        bitmap.ok_or_else(|| Error::InvalidArgs("preview needs --bitmap <file>".to_string()))?;
    let (image_width, image_height) =
        size.ok_or_else(|| Error::InvalidArgs("preview needs --size <W>x<H>".to_string()))?;
    Ok(PreviewOptions {
        bitmap,
        image_width,
        image_height,
        caption,
        width,
        height,
    })
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let invalid = || Error::InvalidArgs(format!("size '{raw}' must look like 122x122"));
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        Error::InvalidArgs(format!(
            "{} must be a positive integer",
            flag.trim_start_matches('-')
        ))
    })
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}
