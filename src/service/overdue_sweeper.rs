use crate::db::{Db, invoices};
use crate::domain::{format_date, today};
use crate::error::{AppResult, BootstrapError};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum SweeperMessage {
    Sweep,
}

/// Handle to the actor that flags unpaid invoices past their due date.
#[derive(Clone)]
pub struct OverdueSweeperHandle {
    actor: ActorRef<SweeperMessage>,
}

impl OverdueSweeperHandle {
    /// Starts the actor; the first sweep runs immediately, then every `interval`.
    pub async fn spawn(db: Db, interval: Duration) -> Result<Self, BootstrapError> {
        let (actor, _jh) = Actor::spawn(
            Some("OverdueSweeper".to_string()),
            OverdueSweeperActor,
            (db, interval),
        )
        .await
        .map_err(|e| BootstrapError::Ractor(format!("OverdueSweeperActor spawn failed: {e}")))?;
        Ok(Self { actor })
    }

    /// Requests an extra sweep outside the schedule.
    pub fn sweep_now(&self) -> Result<(), BootstrapError> {
        ractor::cast!(self.actor, SweeperMessage::Sweep)
            .map_err(|e| BootstrapError::Ractor(format!("OverdueSweeperActor cast failed: {e}")))
    }

    pub fn stop(&self) {
        self.actor.stop(Some("shutdown".to_string()));
    }
}

/// One pass: open invoices whose due date is before today become overdue.
pub async fn sweep_once(db: &Db) -> AppResult<u64> {
    let mut conn = db.acquire().await?;
    Ok(invoices::mark_overdue(&mut conn, &format_date(today())).await?)
}

struct OverdueSweeperState {
    db: Db,
}

struct OverdueSweeperActor;

#[ractor::async_trait]
impl Actor for OverdueSweeperActor {
    type Msg = SweeperMessage;
    type State = OverdueSweeperState;
    type Arguments = (Db, Duration);

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        (db, interval): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let interval = interval.max(Duration::from_secs(1));
        myself.send_interval(interval, || SweeperMessage::Sweep);
        myself.send_message(SweeperMessage::Sweep)?;
        info!(interval_secs = interval.as_secs(), "overdue sweeper started");
        Ok(OverdueSweeperState { db })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SweeperMessage::Sweep => match sweep_once(&state.db).await {
                Ok(0) => debug!("overdue sweep: nothing to flag"),
                Ok(count) => info!(count, "overdue sweep flagged invoices"),
                // A failed pass is retried on the next tick.
                Err(e) => warn!(error = %e, "overdue sweep failed"),
            },
        }
        Ok(())
    }
}
