//! The request/response dispatcher for the embedded protocol.
//!
//! The compiler core consumes the embedded protocol only to implement host
//! callables and the host importer.  The transport itself (framing,
//! encoding) lives outside the core behind the [`Transport`] trait; what
//! lives here is the id bookkeeping: each outbound request is assigned the
//! lowest free integer id, a pending slot records it, and the matching
//! response — which may arrive interleaved with responses to other
//! outstanding requests — is routed back by id.  Freed slots are reused.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ProtocolError;
use crate::importer::Loaded;
use crate::value::Value;

/// A request the core sends to the host.
#[derive(Debug)]
pub enum OutboundRequest {
    /// Invoke a host-registered function.
    FunctionCall {
        function_id: u32,
        arguments: Vec<Value>,
    },

    /// Ask the host importer to canonicalize a URL.
    Canonicalize { url: String, from_import: bool },

    /// Ask the host importer to load a canonical URL.
    Import { url: String },
}

/// The host's reply.
#[derive(Debug)]
pub enum InboundResponse {
    FunctionResult(Result<Value, String>),

    /// `Some` is either the canonical URL or a new URL to re-resolve.
    Canonicalized(Option<String>),

    Imported(Option<Loaded>),
}

/// The byte-framed duplex channel, abstracted.  `send` must not block on
/// the response; `receive` blocks until any response arrives and reports
/// which request id it answers.
pub trait Transport {
    fn send(&self, id: u32, request: OutboundRequest) -> Result<(), ProtocolError>;

    fn receive(&self) -> Result<(u32, InboundResponse), ProtocolError>;
}

enum Slot {
    Free,
    Pending,
    Completed(InboundResponse),
}

pub struct Dispatcher {
    transport: Box<dyn Transport>,
    slots: RefCell<Vec<Slot>>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>) -> Rc<Dispatcher> {
        Rc::new(Dispatcher {
            transport,
            slots: RefCell::new(Vec::new()),
        })
    }

    /// Sends a request and blocks until its response arrives, servicing
    /// other requests' responses in the meantime.
    pub fn call(&self, request: OutboundRequest) -> Result<InboundResponse, ProtocolError> {
        let id = self.allocate();
        self.transport.send(id, request)?;

        loop {
            if let Slot::Completed(_) = self.slots.borrow()[id as usize] {
                let mut slots = self.slots.borrow_mut();
                let response =
                    match std::mem::replace(&mut slots[id as usize], Slot::Free) {
                        Slot::Completed(response) => response,
                        _ => unreachable!("slot state checked above"),
                    };
                return Ok(response);
            }

            let (response_id, response) = self.transport.receive()?;
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(response_id as usize) {
                Some(slot @ Slot::Pending) => *slot = Slot::Completed(response),
                _ => {
                    return Err(ProtocolError::Params(format!(
                        "response for unknown request id {response_id}"
                    )))
                }
            }
        }
    }

    /// The lowest free integer id; slots freed by completed requests are
    /// reused before the table grows.
    fn allocate(&self) -> u32 {
        let mut slots = self.slots.borrow_mut();
        for (i, slot) in slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Free) {
                *slot = Slot::Pending;
                return i as u32;
            }
        }
        slots.push(Slot::Pending);
        (slots.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes function calls immediately, remembering the ids it saw.
    struct EchoTransport {
        sent: RefCell<Vec<u32>>,
        replies: RefCell<Vec<(u32, InboundResponse)>>,
    }

    impl EchoTransport {
        fn new() -> EchoTransport {
            EchoTransport {
                sent: RefCell::new(Vec::new()),
                replies: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for EchoTransport {
        fn send(&self, id: u32, request: OutboundRequest) -> Result<(), ProtocolError> {
            self.sent.borrow_mut().push(id);
            let response = match request {
                OutboundRequest::FunctionCall { function_id, .. } => {
                    InboundResponse::FunctionResult(Ok(Value::Number(
                        crate::value::Number::new(f64::from(function_id)),
                    )))
                }
                OutboundRequest::Canonicalize { url, .. } => {
                    InboundResponse::Canonicalized(Some(url))
                }
                OutboundRequest::Import { .. } => InboundResponse::Imported(None),
            };
            self.replies.borrow_mut().push((id, response));
            Ok(())
        }

        fn receive(&self) -> Result<(u32, InboundResponse), ProtocolError> {
            self.replies
                .borrow_mut()
                .pop()
                .ok_or_else(|| ProtocolError::Internal(String::from("no reply queued")))
        }
    }

    impl Transport for Rc<EchoTransport> {
        fn send(&self, id: u32, request: OutboundRequest) -> Result<(), ProtocolError> {
            (**self).send(id, request)
        }

        fn receive(&self) -> Result<(u32, InboundResponse), ProtocolError> {
            (**self).receive()
        }
    }

    #[test]
    fn ids_start_at_zero_and_are_reused() {
        let transport = Rc::new(EchoTransport::new());
        let dispatcher = Dispatcher::new(Box::new(transport.clone()));

        for _ in 0..3 {
            dispatcher
                .call(OutboundRequest::Canonicalize {
                    url: String::from("x"),
                    from_import: false,
                })
                .unwrap();
        }

        // Each call completed before the next, so the same slot serves all.
        assert_eq!(transport.sent.borrow().as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn responses_route_by_id() {
        let transport = EchoTransport::new();
        let dispatcher = Dispatcher::new(Box::new(transport));

        let response = dispatcher
            .call(OutboundRequest::FunctionCall {
                function_id: 7,
                arguments: Vec::new(),
            })
            .unwrap();

        assert!(matches!(
            response,
            InboundResponse::FunctionResult(Ok(Value::Number(ref n))) if n.value == 7.0
        ));
    }

    /// Replies to request 1 before request 0 to exercise interleaving.
    struct OutOfOrderTransport {
        replies: RefCell<Vec<(u32, InboundResponse)>>,
        outstanding: RefCell<u32>,
    }

    impl Transport for OutOfOrderTransport {
        fn send(&self, id: u32, _request: OutboundRequest) -> Result<(), ProtocolError> {
            *self.outstanding.borrow_mut() += 1;

            // Once both requests are in flight, queue the replies so the
            // older request's answer arrives first, while the newer
            // request is the one being awaited.
            if *self.outstanding.borrow() == 2 {
                let mut replies = self.replies.borrow_mut();
                replies.push((id, InboundResponse::Canonicalized(Some(String::from("b")))));
                replies.push((
                    id - 1,
                    InboundResponse::Canonicalized(Some(String::from("a"))),
                ));
            }
            Ok(())
        }

        fn receive(&self) -> Result<(u32, InboundResponse), ProtocolError> {
            self.replies
                .borrow_mut()
                .pop()
                .ok_or_else(|| ProtocolError::Internal(String::from("no reply queued")))
        }
    }

    #[test]
    fn interleaved_responses_reach_the_right_caller() {
        let dispatcher = Dispatcher::new(Box::new(OutOfOrderTransport {
            replies: RefCell::new(Vec::new()),
            outstanding: RefCell::new(0),
        }));

        // Allocate id 0 as pending, then drive a call on id 1; its answer
        // arrives after id 0's, which must be parked rather than dropped.
        let first = dispatcher.allocate();
        assert_eq!(first, 0);
        dispatcher
            .transport
            .send(
                first,
                OutboundRequest::Canonicalize {
                    url: String::from("first"),
                    from_import: false,
                },
            )
            .unwrap();

        let second = dispatcher
            .call(OutboundRequest::Canonicalize {
                url: String::from("second"),
                from_import: false,
            })
            .unwrap();
        assert!(matches!(
            second,
            InboundResponse::Canonicalized(Some(ref url)) if url == "b"
        ));

        // The parked response for id 0 is waiting in its slot.
        assert!(matches!(
            dispatcher.slots.borrow()[0],
            Slot::Completed(InboundResponse::Canonicalized(Some(ref url))) if url == "a"
        ));
    }

    #[test]
    fn unknown_response_ids_are_protocol_errors() {
        struct BadTransport;
        impl Transport for BadTransport {
            fn send(&self, _id: u32, _request: OutboundRequest) -> Result<(), ProtocolError> {
                Ok(())
            }
            fn receive(&self) -> Result<(u32, InboundResponse), ProtocolError> {
                Ok((42, InboundResponse::Canonicalized(None)))
            }
        }

        let dispatcher = Dispatcher::new(Box::new(BadTransport));
        let result = dispatcher.call(OutboundRequest::Import {
            url: String::from("x"),
        });
        assert!(matches!(result, Err(ProtocolError::Params(_))));
    }
}
