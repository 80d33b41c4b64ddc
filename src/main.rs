mod app;

use std::env;

const WIDTH: u32  = 700;
const HEIGHT: u32 = 700;

/// Value following a flag, or an error naming the flag.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    return args
        .get(i + 1)
        .map(|value| value.as_str())
        .ok_or_else(|| format!("missing value after {}", flag));
}

fn parse_args(args: &[String]) -> Result<app::Params, Box<dyn std::error::Error>> {
    // Default values.
    let mut params = app::Params {
        width: WIDTH,
        height: HEIGHT,
        rotation: 0.0,
        output_path: None,
        mesh_path: None,
        workers: 0,
        wireframe: false,
        depth_view: false,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-r" => {
                let value = flag_value(args, i, flag)?;
                params.rotation = value.parse().map_err(|_| format!("bad rotation angle '{}'", value))?;
                i += 1;
            }
            "-o" => { params.output_path = Some(flag_value(args, i, flag)?.to_string()); i += 1; }
            "-p" => { params.mesh_path = Some(flag_value(args, i, flag)?.to_string()); i += 1; }
            "-w" => {
                let value = flag_value(args, i, flag)?;
                params.workers = value.parse().map_err(|_| format!("bad worker count '{}'", value))?;
                i += 1;
            }
            "--wireframe" => { params.wireframe = true; }
            "--depth" => { params.depth_view = true; }
            _ => { return Err(format!("unknown argument '{}'", flag).into()); }
        }
        i += 1;
    }

    return Ok(params);
}

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let params = parse_args(&args)?;

    app::run(params)?;

    return Ok(());
}
