use std::{env, io::Write, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{Context, Error};
use chrono::Utc;
use tracing_subscriber::EnvFilter;
use worker_shift_planner::worker_shift::calendar::WEEKDAY_LABELS;
use worker_shift_planner::worker_shift::projection::upcoming_shift;
use worker_shift_planner::{
    month_grid, CalendarDay, InMemoryShiftStore, MonthView, Phase, PlannerConfig, Session,
    ShiftDataset, ShiftScreen,
};

const USAGE: &str = "usage: worker_shift_planner <dataset.json> <user-id> [config.json]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let dataset_path = args.get(1).context(USAGE)?;
    let user_id = args.get(2).context(USAGE)?;
    let config = match args.get(3) {
        Some(config_path) => PlannerConfig::load(&PathBuf::from_str(config_path)?)?,
        None => PlannerConfig::default(),
    };

    let path = PathBuf::from_str(dataset_path)?;
    let dataset = ShiftDataset::from_json_file(&path)?;
    let store = Arc::new(InMemoryShiftStore::from_dataset(&dataset)?);

    let session = Session::new(user_id.as_str());
    let screen = ShiftScreen::activate(store.clone(), Some(session.clone()), config.clone());
    let overview = screen
        .wait_for_phase(Phase::Ready)
        .await
        .context("shift screen closed before it was ready")?;
    screen.tear_down().await;

    let mut file = std::fs::File::create("./shift_overview.json")?;
    file.write_all(serde_json::to_string_pretty(&overview)?.as_bytes())?;

    let shifts = store.shifts();
    let now = Utc::now();
    let focus = upcoming_shift(&shifts, &session.user_id, now)
        .map(|shift| shift.start_time)
        .unwrap_or(now)
        .with_timezone(&config.timezone)
        .date_naive();
    let view = MonthView::containing(focus);
    print_month(
        &view,
        &month_grid(&view, &shifts, Some(&session.user_id), config.timezone),
    );

    Ok(())
}

// `*` marks a planned shift, `<` the selected day, `.` a day of another month
fn print_month(view: &MonthView, grid: &[CalendarDay]) {
    println!("{}", view.title());
    println!(
        "{}",
        WEEKDAY_LABELS
            .iter()
            .map(|label| format!("{label:>4}"))
            .collect::<String>()
    );
    for week in grid.chunks(7) {
        let row: String = week
            .iter()
            .map(|day| {
                let mark = if day.has_planned_shift {
                    '*'
                } else if day.is_selected {
                    '<'
                } else if day.outside_month {
                    '.'
                } else {
                    ' '
                };
                format!("{:>3}{mark}", day.day_of_month())
            })
            .collect();
        println!("{row}");
    }
}
