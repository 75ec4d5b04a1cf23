use actix::prelude::*;
use scylla::client::session::Session;
use std::sync::Arc;

use super::{CdcProcessor, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats};
use crate::event_sourcing::core::DomainEvent;
use crate::metrics::Metrics;
use crate::projection::ProjectionBus;

// ============================================================================
// Coordinator Actor - Orchestrates the read-side actors
// ============================================================================
//
// Responsibilities:
// - Manages lifecycle of child actors (CdcProcessor, DlqActor)
// - Answers dead letter queries on behalf of the DlqActor
// - Coordinates graceful shutdown
//
// Actor Hierarchy:
//   CoordinatorActor
//   ├── DlqActor
//   └── CdcProcessor ──(failed records)──> DlqActor
//
// ============================================================================

pub struct CoordinatorActor<E: DomainEvent> {
    session: Arc<Session>,
    keyspace: String,
    bus: Arc<ProjectionBus<E>>,
    metrics: Option<Arc<Metrics>>,
    cdc_processor: Option<Addr<CdcProcessor<E>>>,
    dlq_actor: Option<Addr<DlqActor>>,
}

impl<E: DomainEvent> CoordinatorActor<E> {
    pub fn new(
        session: Arc<Session>,
        keyspace: impl Into<String>,
        bus: Arc<ProjectionBus<E>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
            bus,
            metrics,
            cdc_processor: None,
            dlq_actor: None,
        }
    }

    fn start_child_actors(&mut self) {
        tracing::info!("Starting child actors");

        let dlq_actor = DlqActor::new(self.session.clone(), self.metrics.clone()).start();
        self.dlq_actor = Some(dlq_actor.clone());

        // Start CDC stream processor with DLQ support
        let cdc_processor = CdcProcessor::new(
            self.session.clone(),
            self.keyspace.clone(),
            self.bus.clone(),
            Some(dlq_actor.recipient()),
        )
        .start();
        self.cdc_processor = Some(cdc_processor);

        tracing::info!("All child actors started");
    }
}

impl<E: DomainEvent> Actor for CoordinatorActor<E> {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("CoordinatorActor started - projecting event store changes");
        self.start_child_actors();
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<(), String>")]
pub struct Shutdown;

impl<E: DomainEvent> Handler<Shutdown> for CoordinatorActor<E> {
    type Result = Result<(), String>;

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Received shutdown signal");

        // Stop the producer of DLQ traffic before the DLQ itself
        if let Some(cdc_processor) = self.cdc_processor.take() {
            cdc_processor.do_send(StopActor);
        }

        if let Some(dlq_actor) = self.dlq_actor.take() {
            dlq_actor.do_send(StopActor);
        }

        ctx.stop();

        Ok(())
    }
}

impl<E: DomainEvent> Handler<GetDlqStats> for CoordinatorActor<E> {
    type Result = ResponseFuture<Result<DlqStats, String>>;

    fn handle(&mut self, msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let dlq_actor = self.dlq_actor.clone();
        Box::pin(async move {
            let dlq_actor = dlq_actor.ok_or_else(|| "DLQ actor is not running".to_string())?;
            dlq_actor
                .send(msg)
                .await
                .map_err(|e| format!("DLQ actor unreachable: {}", e))?
        })
    }
}

impl<E: DomainEvent> Handler<GetDlqMessages> for CoordinatorActor<E> {
    type Result = ResponseFuture<Result<Vec<DlqMessage>, String>>;

    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        let dlq_actor = self.dlq_actor.clone();
        Box::pin(async move {
            let dlq_actor = dlq_actor.ok_or_else(|| "DLQ actor is not running".to_string())?;
            dlq_actor
                .send(msg)
                .await
                .map_err(|e| format!("DLQ actor unreachable: {}", e))?
        })
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl<E: DomainEvent> Handler<StopActor> for CdcProcessor<E> {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("CdcProcessor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for DlqActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("DlqActor received stop signal");
        ctx.stop();
    }
}
