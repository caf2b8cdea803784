use clap::Subcommand;
use questlog_core::{DailyWinCategory, StatKind, UserPatch};
use serde_json::json;

use super::{print_json, with_engine, CliResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Print the profile with penalty status
    Show,
    /// Add raw EXP (the penalty multiplier applies)
    Exp { amount: u64 },
    /// Add gold
    Gold { amount: u64 },
    /// Add EXP to one stat
    Stat { stat: StatKind, amount: u32 },
    /// Update profile name or title
    Update {
        #[arg(long)]
        name: Option<String>,
        /// Empty string clears the title
        #[arg(long)]
        title: Option<String>,
    },
    /// Record today's activity: reset daily wins if the day changed and update the streak
    Checkin,
    /// Claim a daily win
    Win { category: DailyWinCategory },
}

pub fn run(action: UserAction) -> CliResult {
    with_engine(|engine| match action {
        UserAction::Show => print_json(&json!({
            "user": engine.user(),
            "penalty": engine.penalty(),
            "penalty_level": engine.penalty_level(),
            "exp_multiplier": engine.exp_multiplier(),
            "can_use_redemption": engine.can_use_redemption(),
        })),
        UserAction::Exp { amount } => print_json(&engine.add_exp(amount)),
        UserAction::Gold { amount } => {
            let total = engine.add_gold(amount);
            print_json(&json!({ "gold": total }))
        }
        UserAction::Stat { stat, amount } => print_json(&engine.increase_stat_free(stat, amount)),
        UserAction::Update { name, title } => {
            let user = engine.update_user(UserPatch { name, title })?;
            print_json(&user)
        }
        UserAction::Checkin => {
            let daily_wins_reset = engine.check_reset_daily_wins();
            let streak = engine.update_streak();
            print_json(&json!({
                "daily_wins_reset": daily_wins_reset,
                "streak": streak,
            }))
        }
        UserAction::Win { category } => {
            engine.complete_daily_win(category)?;
            print_json(&json!({
                "daily_wins": engine.user().daily_wins,
                "all_completed": engine.are_all_daily_wins_completed(),
            }))
        }
    })
}
