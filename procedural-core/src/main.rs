//! `delve-preview [-v...] [--difficulty 0-3] [seed] [config.ron|config.json]`
//!
//! Generates one level, prints the plan, then lights it from the player start
//! and prints what the player would see.

use anyhow::{bail, Context, Result};
use tracing::info;

use delve_core::config::CoreConfig;
use delve_core::generation::audit::audit_level;
use delve_core::generation::{generate_level, Difficulty, LevelParams};
use delve_core::logging::{init_tracing, LogLevel};
use delve_core::visibility::VisibilityEngine;
use delve_core::visualization::{render_light, render_plan, render_view};
use delve_core::world::World;

#[derive(Debug, Default, PartialEq)]
struct PreviewArgs {
    seed: Option<u64>,
    config: Option<String>,
    verbosity: u8,
    difficulty: Option<Difficulty>,
}

impl PreviewArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--difficulty" {
                let raw = args.next().context("--difficulty needs a value")?;
                let id = raw
                    .parse::<u32>()
                    .with_context(|| format!("difficulty must be 0-3, got {raw:?}"))?;
                parsed.difficulty = Some(Difficulty::from_id(id));
            } else if arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v') {
                parsed.verbosity = parsed.verbosity.saturating_add((arg.len() - 1) as u8);
            } else if arg.starts_with('-') {
                bail!("unknown flag {arg:?}");
            } else if parsed.seed.is_none() {
                let seed = arg
                    .parse::<u64>()
                    .with_context(|| format!("seed must be an unsigned integer, got {arg:?}"))?;
                parsed.seed = Some(seed);
            } else if parsed.config.is_none() {
                parsed.config = Some(arg);
            } else {
                bail!("unexpected argument {arg:?}");
            }
        }
        Ok(parsed)
    }

    /// Config file (or defaults) with the command-line overrides applied
    fn resolve_config(&self) -> Result<CoreConfig> {
        let mut config = match &self.config {
            Some(path) => {
                CoreConfig::load(path).with_context(|| format!("loading config from {path}"))?
            }
            None => CoreConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.generation =
                LevelParams::for_difficulty(difficulty, config.generation.level);
        }
        if self.verbosity > 0 {
            config.tracing.default_level = LogLevel::from_verbosity(self.verbosity);
            config.tracing.module_filters.clear();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = PreviewArgs::parse(std::env::args().skip(1))?;
    let seed = args.seed.unwrap_or(42);
    let config = args.resolve_config()?;

    init_tracing(&config.tracing);
    info!(seed, level = config.generation.level, "generating");

    let level = generate_level(&config.generation, seed);
    let audit = audit_level(&level);

    println!("== plan (seed {seed}, level {}) ==", level.level);
    print!("{}", render_plan(&level));
    println!(
        "rooms: {}  deadends: {}  locks: {}  critters: {}  items: {}",
        level.rooms.len(),
        level.rooms.iter().filter(|r| r.is_deadend()).count(),
        level.lock_chain.len(),
        level.critters.len(),
        level.items.len(),
    );
    if let Some(difficulty) = args.difficulty {
        let scale = difficulty.monster_scale();
        println!(
            "difficulty: {difficulty:?}  monster strength x{} speed x{} health x{}",
            scale.strength, scale.speed, scale.health
        );
    }
    for stage in &level.lock_chain {
        println!(
            "  {} lock on room {} guards {:?}",
            stage.color, stage.room, stage.guarded
        );
    }
    println!(
        "audit: connected={} solvable={} adjacent_doors={} keys={:?}",
        audit.tiles_connected, audit.solvable, audit.adjacent_doors, audit.key_order
    );

    let mut world = World::from_level(&level).with_pathing(config.pathing);
    let mut vision = VisibilityEngine::new(config.vision);
    let delta = vision.refresh(&mut world, level.player_start);

    println!();
    println!("== view from {} ({} cells lit) ==", level.player_start, delta.revealed.len());
    print!("{}", render_view(&world, level.level));
    println!();
    println!("== light ==");
    print!("{}", render_light(&world, level.level));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<PreviewArgs> {
        PreviewArgs::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_positional_seed_and_config() {
        let args = parse(&["7", "level.ron"]).unwrap();
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.config.as_deref(), Some("level.ron"));
        assert_eq!(args.verbosity, 0);
        assert!(parse(&["seven"]).is_err());
        assert!(parse(&["1", "a.ron", "extra"]).is_err());
    }

    #[test]
    fn test_verbosity_flags_raise_log_level() {
        let args = parse(&["-v", "-vv", "3"]).unwrap();
        assert_eq!(args.verbosity, 3);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.tracing.default_level, LogLevel::Trace);
        assert!(config.tracing.module_filters.is_empty());

        let quiet = parse(&[]).unwrap().resolve_config().unwrap();
        assert_eq!(quiet.tracing, CoreConfig::default().tracing);
        assert!(parse(&["-x"]).is_err());
    }

    #[test]
    fn test_difficulty_flag_scales_generation() {
        let args = parse(&["--difficulty", "3"]).unwrap();
        assert_eq!(args.difficulty, Some(Difficulty::Nightmare));
        let config = args.resolve_config().unwrap();
        assert_eq!(
            config.generation,
            LevelParams::for_difficulty(Difficulty::Nightmare, config.generation.level)
        );
        assert!(parse(&["--difficulty"]).is_err());
        assert!(parse(&["--difficulty", "hard"]).is_err());
    }
}
