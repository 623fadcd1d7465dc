//! Control del detector desde la línea de comandos: envía comandos, lee el
//! estado, edita el mapa de gestos y lanza el reentrenamiento.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use gestured::actions::SystemAction;
use gestured::camera::{open_with_fallback, Camera};
use gestured::command::{Command, FileCommandChannel};
use gestured::config::{load_config, Config, DEFAULT_CONFIG_FILE};
use gestured::gesture_map::GestureMap;
use gestured::sidecar::HandSidecar;
use gestured::status::StatusSnapshot;

const USAGE: &str = "\
Uso: gesturectl [--config <archivo.json>] <comando>

Comandos:
  start-camera                 Enciende la cámara
  stop-camera                  Apaga la cámara
  mode <control|passive>       Cambia el modo
  record <gesto>               Graba una muestra del gesto
  status                       Muestra el último estado publicado
  map list                     Lista el mapa gesto -> acción
  map set <gesto> <acción>     Asigna una acción a un gesto
  map remove <gesto>           Quita un gesto del mapa
  actions                      Lista las acciones disponibles
  probe                        Prueba las cámaras configuradas
  retrain                      Reentrena el modelo con el dataset (el detector lo recarga)";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config requiere una ruta");
        }
        config_path = PathBuf::from(args.remove(1));
        args.remove(0);
    }
    let config = load_config(&config_path);

    let argv: Vec<&str> = args.iter().map(String::as_str).collect();
    match argv.as_slice() {
        ["start-camera"] => send(&config, Command::StartCamera),
        ["stop-camera"] => send(&config, Command::StopCamera),
        ["mode", mode @ ("control" | "passive")] => send(
            &config,
            Command::SetMode {
                mode: mode.to_string(),
            },
        ),
        ["record", name] => send(
            &config,
            Command::StartRecording {
                name: name.to_string(),
            },
        ),
        ["status"] => status(&config),
        ["map", "list"] => map_list(&config),
        ["map", "set", gesture, action] => map_set(&config, gesture, action),
        ["map", "remove", gesture] => map_remove(&config, gesture),
        ["actions"] => {
            for action in SystemAction::ALL {
                println!("{action}");
            }
            Ok(())
        }
        ["probe"] => probe(&config),
        ["retrain"] => retrain(&config, &config_path),
        ["-h"] | ["--help"] | [] => {
            println!("{USAGE}");
            Ok(())
        }
        _ => Err(anyhow!("Comando inválido: {}\n\n{USAGE}", argv.join(" "))),
    }
}

fn send(config: &Config, command: Command) -> Result<()> {
    let channel = FileCommandChannel::new(&config.paths.command);
    channel
        .send(&command)
        .with_context(|| format!("No se pudo escribir {:?}", channel.path()))?;
    println!("📨 Enviado: {:?}", command);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let snap = StatusSnapshot::read(&config.paths.status)
        .with_context(|| format!("No hay estado en {:?}", config.paths.status))?;

    println!("Actualizado:  {}", snap.last_update);
    println!("Cámara:       {}", if snap.camera_on { "encendida" } else { "apagada" });
    println!("Modo:         {}", if snap.control_active { "control" } else { "pasivo" });
    println!("Grabando:     {}", snap.recording);
    println!("Modelo:       {}", if snap.model_loaded { "cargado" } else { "no disponible" });
    match snap.current_gesture {
        Some(gesture) => println!("Gesto:        {} ({:.2})", gesture, snap.confidence),
        None => println!("Gesto:        -"),
    }
    if !snap.action_log.is_empty() {
        println!("\nÚltimas acciones:");
        for entry in &snap.action_log {
            println!("  {}  {}", entry.time, entry.name);
        }
    }
    Ok(())
}

fn map_list(config: &Config) -> Result<()> {
    let map = GestureMap::load(&config.paths.gesture_map)?;
    if map.is_empty() {
        println!("(mapa vacío)");
    }
    for (gesture, action) in map.iter() {
        println!("{:<20} -> {}", gesture, action);
    }
    Ok(())
}

fn map_set(config: &Config, gesture: &str, action: &str) -> Result<()> {
    action
        .parse::<SystemAction>()
        .map_err(|e| anyhow!("{e}. Usa `gesturectl actions` para ver la lista"))?;

    let mut map = GestureMap::load(&config.paths.gesture_map)?;
    match map.set(gesture, action) {
        Some(previous) => println!("{gesture}: {previous} -> {action}"),
        None => println!("{gesture} -> {action}"),
    }
    map.save(&config.paths.gesture_map)
}

fn map_remove(config: &Config, gesture: &str) -> Result<()> {
    let mut map = GestureMap::load(&config.paths.gesture_map)?;
    if map.remove(gesture).is_none() {
        bail!("El gesto '{gesture}' no está en el mapa");
    }
    map.save(&config.paths.gesture_map)?;
    println!("Eliminado: {gesture}");
    Ok(())
}

/// Abre la primera cámara disponible y la cierra
fn probe(config: &Config) -> Result<()> {
    let mut camera = HandSidecar::spawn(&config.camera.python, &config.camera.sidecar_script)?;
    let probe = open_with_fallback(&mut camera, &config.camera.probes)?;
    println!("✅ Cámara {} ({:?}) disponible", probe.index, probe.backend);

    match camera.read() {
        Ok(frame) if frame.hand.is_some() => println!("✋ Mano detectada"),
        Ok(_) => println!("Sin mano en el primer frame"),
        Err(e) => println!("⚠️  No se pudo leer un frame: {e}"),
    }
    camera.release();
    Ok(())
}

/// Lanza el script de entrenamiento con el mismo intérprete que el detector de manos
fn retrain(config: &Config, config_path: &Path) -> Result<()> {
    let script = &config.paths.retrain_script;
    if !script.exists() {
        bail!("No se encontró el script de entrenamiento en {:?}", script);
    }
    println!("🧠 Reentrenando con {:?}...", config.paths.dataset_dir);

    let status = process::Command::new(&config.camera.python)
        .arg(script)
        .arg("--config")
        .arg(config_path)
        .status()
        .with_context(|| format!("No se pudo lanzar {:?}", config.camera.python))?;
    if !status.success() {
        bail!("El entrenamiento terminó con {status}");
    }
    println!("✅ Modelo actualizado en {:?}", config.paths.model);
    Ok(())
}
