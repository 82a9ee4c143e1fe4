use chrono::{DateTime, Days, FixedOffset, NaiveTime, Utc};
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::error::ReporterError;
use crate::service::runner::ReportRunner;
use crate::types::run::RunRequest;

/// Messages handled by the schedule actor.
#[derive(Debug)]
pub enum ScheduleMessage {
    /// Time for the daily run.
    Fire,
}

/// Handle for the running schedule.
#[derive(Clone)]
pub struct ScheduleHandle {
    actor: ActorRef<ScheduleMessage>,
}

impl ScheduleHandle {
    /// Stop the actor and wait for it to exit. A run in progress finishes
    /// first; the pending timer is cancelled.
    pub async fn shutdown(&self) {
        if let Err(e) = self
            .actor
            .stop_and_wait(Some("shutdown".to_string()), Some(SHUTDOWN_TIMEOUT))
            .await
        {
            warn!(error = %e, "schedule actor did not stop cleanly");
        }
    }
}

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

type FireTimer = JoinHandle<Result<(), MessagingErr<ScheduleMessage>>>;

pub struct ScheduleArgs {
    pub runner: ReportRunner,
    pub daily_at: NaiveTime,
    pub offset: FixedOffset,
}

struct ScheduleState {
    runner: ReportRunner,
    daily_at: NaiveTime,
    offset: FixedOffset,
    timer: Option<FireTimer>,
}

impl ScheduleState {
    fn arm(&mut self, myself: &ActorRef<ScheduleMessage>) {
        let delay = next_fire_delay(Utc::now(), self.daily_at, self.offset);
        info!(
            daily_at = %self.daily_at,
            in_secs = delay.as_secs(),
            "next scheduled bacula report armed"
        );
        self.disarm();
        self.timer = Some(myself.send_after(delay, || ScheduleMessage::Fire));
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Fires one normal run per day. Runs execute inside the actor, so two
/// scheduled runs never overlap.
struct ScheduleActor;

#[ractor::async_trait]
impl Actor for ScheduleActor {
    type Msg = ScheduleMessage;
    type State = ScheduleState;
    type Arguments = ScheduleArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let mut state = ScheduleState {
            runner: args.runner,
            daily_at: args.daily_at,
            offset: args.offset,
            timer: None,
        };
        state.arm(&myself);
        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.disarm();
        info!("daily report schedule stopped");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ScheduleMessage::Fire => {
                info!("scheduled bacula report firing");
                match state.runner.run(RunRequest::default()).await {
                    Ok(summary) => info!(
                        success = summary.success,
                        message = %summary.message,
                        "scheduled bacula report done"
                    ),
                    Err(e) => error!(error = %e, "scheduled bacula report failed"),
                }
                state.arm(&myself);
            }
        }
        Ok(())
    }
}

/// Time until the next `daily_at` strictly after `now`, read in `offset`.
pub fn next_fire_delay(now: DateTime<Utc>, daily_at: NaiveTime, offset: FixedOffset) -> Duration {
    let local = now.with_timezone(&offset).naive_local();
    let mut next = local.date().and_time(daily_at);
    if next <= local {
        next = next.checked_add_days(Days::new(1)).unwrap_or(next);
    }
    (next - local).to_std().unwrap_or(Duration::ZERO)
}

pub fn parse_daily_at(raw: &str) -> Result<NaiveTime, ReporterError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| ReporterError::Config(format!("invalid schedule.daily_at {raw:?}: {e}")))
}

/// Start the daily schedule for `runner`.
pub async fn spawn(
    runner: ReportRunner,
    cfg: &ScheduleConfig,
) -> Result<ScheduleHandle, ReporterError> {
    let daily_at = parse_daily_at(&cfg.daily_at)?;
    let offset = runner.settings().utc_offset;
    let (actor, _jh) = Actor::spawn(
        Some("BaculaReportSchedule".to_string()),
        ScheduleActor,
        ScheduleArgs {
            runner,
            daily_at,
            offset,
        },
    )
    .await
    .map_err(|e| ReporterError::RactorError(format!("spawn schedule actor failed: {e}")))?;
    Ok(ScheduleHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn fires_later_today_when_time_not_reached() {
        // 09:00 UTC is 06:00 at -03:00
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(next_fire_delay(now, at, brt()), Duration::from_secs(2 * 3600));
    }

    #[test]
    fn fires_tomorrow_once_time_passed() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 11, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(next_fire_delay(now, at, brt()), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn daily_at_must_be_hour_minute() {
        assert_eq!(
            parse_daily_at("07:30").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert!(matches!(parse_daily_at("7h30"), Err(ReporterError::Config(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_actor_with_timer_pending() {
        let storage = crate::db::ReportStorage::connect("sqlite::memory:")
            .await
            .unwrap();
        let runner = ReportRunner::from_config(storage, &crate::config::Config::default()).unwrap();
        let cfg = ScheduleConfig {
            enabled: true,
            daily_at: "08:00".to_string(),
        };
        let handle = spawn(runner, &cfg).await.unwrap();
        assert_eq!(handle.actor.get_status(), ractor::ActorStatus::Running);

        handle.shutdown().await;
        assert_eq!(handle.actor.get_status(), ractor::ActorStatus::Stopped);
        assert!(handle.actor.cast(ScheduleMessage::Fire).is_err());
    }
}
