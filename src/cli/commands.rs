use clap::Subcommand;

use super::apply::ApplyArgs;
use super::config::ConfigArgs;
use super::init::InitArgs;
use super::rules::RulesArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Seed empty rule lists in the store
    Init(InitArgs),

    /// Inspect or clear the persisted rules
    Rules(RulesArgs),

    /// Apply the persisted rules to a page fixture and report visibility
    Apply(ApplyArgs),

    /// Answer JSON line requests on stdin against a page fixture
    Serve(ServeArgs),

    /// Show or validate the configuration
    Config(ConfigArgs),
}
