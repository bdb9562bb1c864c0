use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCreatedEvent,
    OrderStatusChangedEvent,
    RefundEvent,
};

/// The sending halves of every registered handler, handed to the engine APIs.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub refund_producer: Vec<EventProducer<RefundEvent>>,
}

impl EventProducers {
    pub async fn publish_order_created(&self, event: OrderCreatedEvent) {
        for emitter in &self.order_created_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_status_changed(&self, event: OrderStatusChangedEvent) {
        for emitter in &self.status_changed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_refund(&self, event: RefundEvent) {
        for emitter in &self.refund_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_refund: Option<EventHandler<RefundEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new("order_created", buffer_size, f));
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new("status_changed", buffer_size, f));
        let on_refund = hooks.on_refund.map(|f| EventHandler::new("refund", buffer_size, f));
        Self { on_order_created, on_status_changed, on_refund }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund {
            result.refund_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per configured handler. Each task ends once every producer for it has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.run());
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.run());
        }
        if let Some(handler) = self.on_refund {
            tokio::spawn(handler.run());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_refund: Option<Handler<RefundEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_refund<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_refund = Some(Arc::new(f));
        self
    }
}
