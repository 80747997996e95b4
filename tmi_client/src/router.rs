use std::collections::HashMap;

use tmi_proto::{MessageEvent, MessageKind, ServerMessage};

type BoxedHandler = Box<dyn Fn(&ServerMessage) + Send + Sync>;

/// Maps each concrete message kind to at most one registered handler.
///
/// Handlers run synchronously on the inbound-dispatch task; kinds without a
/// handler are silently dropped.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<MessageKind, BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the message kind `E`. Registering a second
    /// handler for the same kind replaces the first; there is no
    /// multi-subscriber fan-out.
    pub fn register<E, F>(&mut self, handler: F)
    where
        E: MessageEvent + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.handlers.insert(
            E::KIND,
            Box::new(move |msg| {
                if let Some(event) = E::from_message(msg) {
                    handler(event);
                }
            }),
        );
    }

    /// Invoke the handler registered for `msg`'s kind, if any, on the
    /// caller's task. Returns whether a handler ran.
    pub fn dispatch(&self, msg: &ServerMessage) -> bool {
        match self.handlers.get(&msg.kind()) {
            Some(handler) => {
                handler(msg);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use tmi_proto::{Notice, Ping, Privmsg, RawMessage};

    fn classify(line: &str) -> ServerMessage {
        ServerMessage::from_raw(RawMessage::parse(line))
    }

    #[test]
    fn dispatches_to_registered_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();

        let sink = Arc::clone(&seen);
        router.register(move |msg: &Privmsg| {
            sink.lock().push(msg.message.clone());
        });

        let handled = router.dispatch(&classify("PRIVMSG #dallas :hello"));
        assert!(handled);
        assert_eq!(seen.lock().as_slice(), ["hello"]);
    }

    #[test]
    fn unhandled_kind_is_silently_dropped() {
        let router = Router::new();
        assert!(!router.dispatch(&classify("PING :tmi.twitch.tv")));
    }

    #[test]
    fn second_registration_replaces_first() {
        let first = Arc::new(Mutex::new(0u32));
        let second = Arc::new(Mutex::new(0u32));
        let mut router = Router::new();

        let counter = Arc::clone(&first);
        router.register(move |_: &Ping| *counter.lock() += 1);
        let counter = Arc::clone(&second);
        router.register(move |_: &Ping| *counter.lock() += 1);

        router.dispatch(&classify("PING :tmi.twitch.tv"));

        assert_eq!(*first.lock(), 0);
        assert_eq!(*second.lock(), 1);
    }

    #[test]
    fn raw_frames_are_routable() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();

        let sink = Arc::clone(&seen);
        router.register(move |msg: &RawMessage| {
            sink.lock().push(msg.raw.clone());
        });

        router.dispatch(&classify(":tmi.twitch.tv 001 ronni :Welcome, GLHF!"));
        assert_eq!(
            seen.lock().as_slice(),
            [":tmi.twitch.tv 001 ronni :Welcome, GLHF!"]
        );
    }

    #[test]
    fn handlers_are_kind_isolated() {
        let seen = Arc::new(Mutex::new(0u32));
        let mut router = Router::new();

        let counter = Arc::clone(&seen);
        router.register(move |_: &Notice| *counter.lock() += 1);

        router.dispatch(&classify("PRIVMSG #dallas :hello"));
        assert_eq!(*seen.lock(), 0);

        router.dispatch(&classify("@msg-id=slow_off NOTICE #dallas :ok"));
        assert_eq!(*seen.lock(), 1);
    }
}
