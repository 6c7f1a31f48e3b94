//! Streaming request decoder.
//!
//! The decoder layers a builder over the character tokenizer: an explicit
//! tagged stack of parse contexts tracks "what is currently being built"
//! (a `getProperties` request, a `newSwitchVector`, an item inside its
//! `items` array, ...) with a `step(token)` function per token. This keeps
//! the single-pass, bounded-memory property of the tokenizer while staying
//! unit-testable. A request is complete - and only then handed to the
//! caller - when its enclosing object closes at depth zero.

use starbus_core::{BlobMode, ItemRequest, PropertyKind, PropertyRequest, RequestValue};
use tracing::trace;

use crate::error::{Result, WireError};
use crate::message::{Request, new_vector_kind};
use crate::token::{Token, Tokenizer};

/// One frame of the parse-context stack.
#[derive(Debug)]
enum Context {
    /// The outermost object; holds the finished payload until it closes.
    Top {
        key: Option<String>,
        request: Option<Request>,
    },
    /// Inside a `getProperties` payload object.
    GetProperties {
        version: Option<String>,
        client: Option<String>,
        device: Option<String>,
        name: Option<String>,
    },
    /// Inside a `newXVector` payload object.
    NewVector(PropertyRequest),
    /// Inside an `enableBLOB` payload object.
    EnableBlob {
        device: String,
        name: Option<String>,
        mode: BlobMode,
    },
    /// Inside the `items` array of a `newXVector`.
    Items(Vec<ItemRequest>),
    /// Inside one element of the `items` array.
    Item {
        name: Option<String>,
        value: Option<RequestValue>,
    },
    /// Consuming an unknown object/array value.
    Skip(usize),
}

/// Streaming decoder for inbound requests.
///
/// Feed it transport chunks of any size; it hands back every request whose
/// top-level object closed inside the chunk. Errors are terminal: the
/// caller closes the connection and discards the decoder.
pub struct RequestDecoder {
    tokenizer: Tokenizer,
    stack: Vec<Context>,
    key: Option<String>,
    scratch: Vec<Token>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            stack: Vec::new(),
            key: None,
            scratch: Vec::new(),
        }
    }

    /// Decode a chunk of input, returning every request completed by it.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Request>> {
        self.scratch.clear();
        let mut tokens = std::mem::take(&mut self.scratch);
        self.tokenizer.feed(chunk, &mut tokens)?;
        let mut requests = Vec::new();
        for token in tokens.drain(..) {
            if let Some(request) = self.step(token)? {
                requests.push(request);
            }
        }
        self.scratch = tokens;
        Ok(requests)
    }

    /// Advance the context stack by one token.
    fn step(&mut self, token: Token) -> Result<Option<Request>> {
        // Unknown subtrees are consumed by depth counting alone.
        if let Some(Context::Skip(depth)) = self.stack.last_mut() {
            match token {
                Token::BeginObject | Token::BeginArray => *depth += 1,
                Token::EndObject | Token::EndArray => {
                    *depth -= 1;
                    if *depth == 0 {
                        self.stack.pop();
                    }
                }
                _ => {}
            }
            return Ok(None);
        }

        match self.stack.last_mut() {
            None => {
                // Only an object may open at top level; the tokenizer has
                // already rejected everything else.
                if token == Token::BeginObject {
                    self.stack.push(Context::Top {
                        key: None,
                        request: None,
                    });
                }
                Ok(None)
            }

            Some(Context::Top { key, request }) => match token {
                Token::Name(name) => {
                    *key = Some(name);
                    Ok(None)
                }
                Token::BeginObject => {
                    let message_key = key.take().unwrap_or_default();
                    let context = match message_key.as_str() {
                        "getProperties" => Context::GetProperties {
                            version: None,
                            client: None,
                            device: None,
                            name: None,
                        },
                        "enableBLOB" => Context::EnableBlob {
                            device: String::new(),
                            name: None,
                            mode: BlobMode::Never,
                        },
                        other => match new_vector_kind(other) {
                            Some(kind) => {
                                Context::NewVector(PropertyRequest::new(kind, "", ""))
                            }
                            None => {
                                trace!(key = %other, "skipping unknown message kind");
                                Context::Skip(1)
                            }
                        },
                    };
                    self.stack.push(context);
                    Ok(None)
                }
                Token::BeginArray => {
                    key.take();
                    self.stack.push(Context::Skip(1));
                    Ok(None)
                }
                Token::EndObject => {
                    let request = request.take();
                    self.stack.pop();
                    Ok(request)
                }
                // Unknown scalar top-level member.
                _ => {
                    key.take();
                    Ok(None)
                }
            },

            Some(Context::GetProperties { .. }) => match token {
                Token::Name(name) => {
                    self.key = Some(name);
                    Ok(None)
                }
                Token::Text(_) | Token::Number(_) | Token::Logical(_) => {
                    let value = scalar_to_string(&token);
                    if let Some(Context::GetProperties {
                        version,
                        client,
                        device,
                        name,
                    }) = self.stack.last_mut()
                    {
                        match self.key.take().as_deref() {
                            Some("version") => *version = Some(value),
                            Some("client") => *client = Some(value),
                            Some("device") => *device = Some(value),
                            Some("name") => *name = Some(value),
                            _ => {}
                        }
                    }
                    Ok(None)
                }
                Token::BeginObject | Token::BeginArray => {
                    self.key.take();
                    self.stack.push(Context::Skip(1));
                    Ok(None)
                }
                Token::EndObject => {
                    let Some(Context::GetProperties {
                        version,
                        client,
                        device,
                        name,
                    }) = self.stack.pop()
                    else {
                        unreachable!("matched GetProperties above");
                    };
                    self.finish_payload(Request::GetProperties {
                        version,
                        client,
                        device,
                        name,
                    });
                    Ok(None)
                }
                Token::EndArray => Err(WireError::Grammar("array close in payload")),
            },

            Some(Context::NewVector(request)) => match token {
                Token::Name(name) => {
                    self.key = Some(name);
                    Ok(None)
                }
                Token::Text(value) => {
                    match self.key.take().as_deref() {
                        Some("device") => request.device = value,
                        Some("name") => request.name = value,
                        Some("token") => request.token = value.trim().parse().ok(),
                        _ => {}
                    }
                    Ok(None)
                }
                Token::Number(value) => {
                    if self.key.take().as_deref() == Some("token") {
                        request.token = Some(value as u64);
                    }
                    Ok(None)
                }
                Token::Logical(_) => {
                    self.key.take();
                    Ok(None)
                }
                Token::BeginArray => {
                    if self.key.take().as_deref() == Some("items") {
                        self.stack.push(Context::Items(Vec::new()));
                    } else {
                        self.stack.push(Context::Skip(1));
                    }
                    Ok(None)
                }
                Token::BeginObject => {
                    self.key.take();
                    self.stack.push(Context::Skip(1));
                    Ok(None)
                }
                Token::EndObject => {
                    let Some(Context::NewVector(request)) = self.stack.pop() else {
                        unreachable!("matched NewVector above");
                    };
                    self.finish_payload(Request::Change(request));
                    Ok(None)
                }
                Token::EndArray => Err(WireError::Grammar("array close in payload")),
            },

            Some(Context::EnableBlob { .. }) => match token {
                Token::Name(name) => {
                    self.key = Some(name);
                    Ok(None)
                }
                Token::Text(value) => {
                    if let Some(Context::EnableBlob { device, name, mode }) =
                        self.stack.last_mut()
                    {
                        match self.key.take().as_deref() {
                            Some("device") => *device = value,
                            Some("name") => *name = Some(value),
                            Some("value") => {
                                *mode = BlobMode::parse(&value).unwrap_or(BlobMode::Never);
                            }
                            _ => {}
                        }
                    }
                    Ok(None)
                }
                Token::Number(_) | Token::Logical(_) => {
                    self.key.take();
                    Ok(None)
                }
                Token::BeginObject | Token::BeginArray => {
                    self.key.take();
                    self.stack.push(Context::Skip(1));
                    Ok(None)
                }
                Token::EndObject => {
                    let Some(Context::EnableBlob { device, name, mode }) = self.stack.pop()
                    else {
                        unreachable!("matched EnableBlob above");
                    };
                    self.finish_payload(Request::EnableBlob { device, name, mode });
                    Ok(None)
                }
                Token::EndArray => Err(WireError::Grammar("array close in payload")),
            },

            Some(Context::Items(_)) => match token {
                Token::BeginObject => {
                    self.stack.push(Context::Item {
                        name: None,
                        value: None,
                    });
                    Ok(None)
                }
                Token::EndArray => {
                    let Some(Context::Items(items)) = self.stack.pop() else {
                        unreachable!("matched Items above");
                    };
                    if let Some(Context::NewVector(request)) = self.stack.last_mut() {
                        request.items = items;
                    }
                    Ok(None)
                }
                _ => Err(WireError::Grammar("items array may only hold objects")),
            },

            Some(Context::Item { .. }) => match token {
                Token::Name(name) => {
                    self.key = Some(name);
                    Ok(None)
                }
                Token::Text(text) => {
                    if let Some(Context::Item { name, value }) = self.stack.last_mut() {
                        match self.key.take().as_deref() {
                            Some("name") => *name = Some(text),
                            Some("value") => *value = Some(RequestValue::Text(text)),
                            _ => {}
                        }
                    }
                    Ok(None)
                }
                Token::Number(number) => {
                    if let Some(Context::Item { value, .. }) = self.stack.last_mut() {
                        if self.key.take().as_deref() == Some("value") {
                            *value = Some(RequestValue::Number(number));
                        }
                    }
                    Ok(None)
                }
                Token::Logical(on) => {
                    if let Some(Context::Item { value, .. }) = self.stack.last_mut() {
                        if self.key.take().as_deref() == Some("value") {
                            *value = Some(RequestValue::Switch(on));
                        }
                    }
                    Ok(None)
                }
                Token::BeginObject | Token::BeginArray => {
                    self.key.take();
                    self.stack.push(Context::Skip(1));
                    Ok(None)
                }
                Token::EndObject => {
                    let Some(Context::Item { name, value }) = self.stack.pop() else {
                        unreachable!("matched Item above");
                    };
                    let kind = self.enclosing_vector_kind();
                    if let (Some(name), Some(value)) = (name, value) {
                        if let Some(Context::Items(items)) = self.stack.last_mut() {
                            items.push(ItemRequest {
                                name,
                                value: coerce(value, kind),
                            });
                        }
                    }
                    Ok(None)
                }
                Token::EndArray => Err(WireError::Grammar("array close in item")),
            },

            Some(Context::Skip(_)) => unreachable!("skip is handled before the match"),
        }
    }

    /// Store a finished payload on the enclosing top-level context.
    fn finish_payload(&mut self, request: Request) {
        if let Some(Context::Top {
            request: pending, ..
        }) = self.stack.last_mut()
        {
            *pending = Some(request);
        }
    }

    fn enclosing_vector_kind(&self) -> Option<PropertyKind> {
        self.stack.iter().rev().find_map(|context| match context {
            Context::NewVector(request) => Some(request.kind),
            _ => None,
        })
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind-directed coercion for item payloads; some clients send switch
/// values as quoted tokens.
fn coerce(value: RequestValue, kind: Option<PropertyKind>) -> RequestValue {
    match (kind, &value) {
        (Some(PropertyKind::Switch), RequestValue::Text(text)) => match text.as_str() {
            "true" | "On" => RequestValue::Switch(true),
            "false" | "Off" => RequestValue::Switch(false),
            _ => value,
        },
        _ => value,
    }
}

fn scalar_to_string(token: &Token) -> String {
    match token {
        Token::Text(s) => s.clone(),
        Token::Number(n) => n.to_string(),
        Token::Logical(b) => b.to_string(),
        _ => String::new(),
    }
}
