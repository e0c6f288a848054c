//! Strategy processors
//!
//! Each processor reads one data category and turns split records into raw
//! signals. Processors never touch the database; the orchestrator hands them
//! the records fetched through the shared repository.
//!
//! | Processor          | Category           | Reads          |
//! |--------------------|--------------------|----------------|
//! | `sharp_action`     | `SharpAction`      | latest splits  |
//! | `opposing_markets` | `OpposingMarkets`  | latest splits  |
//! | `book_conflict`    | `BookConflict`     | latest splits  |
//! | `steam_move`       | `SteamMove`        | split history  |
//! | `public_fade`      | `PublicFade`       | latest splits  |
//! | `late_flip`        | `LateFlip`         | split history  |
//! | `consensus`        | `Consensus`        | latest splits  |
//! | `underdog_value`   | `UnderdogValue`    | latest splits  |

use std::sync::Arc;

use crate::config::StrategiesConfig;

pub mod book_conflict;
pub mod consensus;
pub mod late_flip;
pub mod opposing_markets;
pub mod public_fade;
pub mod sharp_action;
pub mod steam_move;
pub mod traits;
pub mod underdog_value;

#[cfg(test)]
pub(crate) mod testing;

pub use book_conflict::BookConflictProcessor;
pub use consensus::ConsensusProcessor;
pub use late_flip::LateFlipProcessor;
pub use opposing_markets::OpposingMarketsProcessor;
pub use public_fade::PublicFadeProcessor;
pub use sharp_action::SharpActionProcessor;
pub use steam_move::SteamMoveProcessor;
pub use traits::StrategyProcessor;
pub use underdog_value::UnderdogValueProcessor;

/// Build the processor registry from configuration, skipping disabled strategies
pub fn build_processors(config: &StrategiesConfig) -> Vec<Arc<dyn StrategyProcessor>> {
    let mut processors: Vec<Arc<dyn StrategyProcessor>> = Vec::new();

    if config.sharp_action.enabled {
        processors.push(Arc::new(SharpActionProcessor::new(config.sharp_action.clone())));
    }
    if config.opposing_markets.enabled {
        processors.push(Arc::new(OpposingMarketsProcessor::new(
            config.opposing_markets.clone(),
        )));
    }
    if config.book_conflict.enabled {
        processors.push(Arc::new(BookConflictProcessor::new(config.book_conflict.clone())));
    }
    if config.steam_move.enabled {
        processors.push(Arc::new(SteamMoveProcessor::new(config.steam_move.clone())));
    }
    if config.public_fade.enabled {
        processors.push(Arc::new(PublicFadeProcessor::new(config.public_fade.clone())));
    }
    if config.late_flip.enabled {
        processors.push(Arc::new(LateFlipProcessor::new(config.late_flip.clone())));
    }
    if config.consensus.enabled {
        processors.push(Arc::new(ConsensusProcessor::new(config.consensus.clone())));
    }
    if config.underdog_value.enabled {
        processors.push(Arc::new(UnderdogValueProcessor::new(
            config.underdog_value.clone(),
        )));
    }

    processors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_registry_has_unique_names() {
        let processors = build_processors(&StrategiesConfig::default());
        assert_eq!(processors.len(), 8);

        let names: HashSet<&str> = processors.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), processors.len());
    }

    #[test]
    fn test_disabled_strategy_is_skipped() {
        let mut config = StrategiesConfig::default();
        config.late_flip.enabled = false;

        let processors = build_processors(&config);
        assert_eq!(processors.len(), 7);
        assert!(processors.iter().all(|p| p.name() != "late_flip"));
    }
}
