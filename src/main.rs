/*
gestured - Detector de gestos de mano por cámara

Sistema que:
1. Captura frames de la cámara y detecta la mano (subproceso MediaPipe)
2. Graba muestras de gestos bajo demanda (dataset/<gesto>/sample_N.csv)
3. Clasifica la pose actual con un modelo ONNX y ejecuta la acción mapeada
4. Detecta swipes horizontales para cambiar de pestaña

Se controla escribiendo comandos en recording_cmd.json (ver gesturectl) y
publica su estado en status.json.

Antes de todo, preparar el entorno Python del detector de manos:
python -m venv .venv && .venv/bin/pip install mediapipe opencv-python

Para ejecutar:
RUST_LOG=info ./target/release/gestured [--config gestured.json] [--dry-run] [--no-preview]

Para acceso a /dev/uinput sin root:
sg input -c './target/release/gestured'
*/

use anyhow::{anyhow, bail, Result};
use std::env;
use std::path::PathBuf;

use gestured::actions::{ActionDispatcher, HidDispatcher, LogDispatcher};
use gestured::command::FileCommandChannel;
use gestured::config::{load_config, DEFAULT_CONFIG_FILE};
use gestured::detector::Detector;
use gestured::sidecar::HandSidecar;

struct Options {
    config: PathBuf,
    dry_run: bool,
    no_preview: bool,
}

const USAGE: &str = "Uso: gestured [--config <archivo.json>] [--dry-run] [--no-preview]";

fn parse_args() -> Result<Options> {
    let mut opts = Options {
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        dry_run: false,
        no_preview: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                opts.config = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("--config requiere una ruta"))?;
            }
            "--dry-run" => opts.dry_run = true,
            "--no-preview" => opts.no_preview = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("Argumento desconocido: {other}\n{USAGE}"),
        }
    }
    Ok(opts)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = parse_args()?;
    log::info!("🎯 gestured - Detector de gestos por cámara");

    let mut config = load_config(&opts.config);
    if opts.no_preview {
        config.camera.show_preview = false;
    }

    let camera = HandSidecar::spawn(&config.camera.python, &config.camera.sidecar_script)?;

    let dispatcher: Box<dyn ActionDispatcher> = if opts.dry_run {
        log::info!("🔧 Modo: dry-run (sin HID)");
        Box::new(LogDispatcher)
    } else {
        Box::new(HidDispatcher::spawn())
    };

    let commands = FileCommandChannel::new(&config.paths.command);
    log::info!("📨 Esperando comandos en {:?}", commands.path());

    let mut detector = Detector::with_onnx_model(
        config,
        Box::new(camera),
        Box::new(commands),
        dispatcher,
    );
    detector.run();

    Ok(())
}
