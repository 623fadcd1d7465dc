use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use gestured::classifier::{Classification, ClassifierBridge, OnnxGestureModel, Prediction};
use gestured::config::{load_config, DEFAULT_CONFIG_FILE};
use gestured::dataset::load_sample;
use gestured::gesture_map::GestureMap;

struct ReplayOptions {
    config: PathBuf,
    dump_scores: bool,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        dump_scores: false,
    };
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-scores" => opts.dump_scores = true,
            "--config" => {
                opts.config = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("--config requiere una ruta"))?;
            }
            _ => {
                if csv_path.is_some() {
                    bail!("Uso: replay_sample [--config <archivo.json>] [--dump-scores] <sample_N.csv>");
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((csv_path, opts))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (csv_path, opts) = parse_args()?;
    let config = load_config(&opts.config);
    println!("🎞️  Reproduciendo muestra desde {:?}", csv_path);

    let frames = load_sample(&csv_path)?;
    if frames.is_empty() {
        bail!("La muestra no tiene frames");
    }
    println!("ℹ️  {} frames", frames.len());

    let mut model = OnnxGestureModel::new(&config.paths.model, &config.paths.classes)?;
    let map = GestureMap::load(&config.paths.gesture_map)?;
    let bridge = ClassifierBridge::new(
        config.classifier.display_threshold,
        config.classifier.action_threshold,
    );

    let mut votes: HashMap<String, usize> = HashMap::new();
    for (idx, frame) in frames.iter().enumerate() {
        let mut scores: Vec<(String, f32)> =
            model.predict_scores(frame.as_slice())?.into_iter().collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (label, confidence) = scores
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("El modelo no devolvió probabilidades"))?;
        *votes.entry(label.clone()).or_default() += 1;

        let prediction = Prediction {
            label: label.clone(),
            confidence,
        };
        let action = match bridge.decide(prediction, &map, true, false) {
            Classification::Mapped { action_name, decision, .. } => {
                format!("{action_name} [{decision:?}]")
            }
            Classification::Unmapped(_) => "-".to_string(),
        };

        println!(
            "  {:>3}. {:<20} {:>6.2}%  {}",
            idx,
            label,
            confidence * 100.0,
            action
        );

        if opts.dump_scores {
            for (label, score) in scores.iter().skip(1).take(4) {
                println!("        {:<20} {:>6.2}%", label, score * 100.0);
            }
        }
    }

    let mut ranking: Vec<(String, usize)> = votes.into_iter().collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some((label, count)) = ranking.first() {
        println!(
            "\n🗳️  Mayoría: {} ({}/{} frames)",
            label,
            count,
            frames.len()
        );
    }

    Ok(())
}
