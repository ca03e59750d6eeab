//! Pagination and include resolution for listing endpoints.
//!
//! A listing is fetched page by page with `offset`/`per_page` query
//! parameters. Every item of a page's `data` becomes a [`Record`] carrying
//! the objects its relationships point at, looked up in the page's
//! `included` set. Paging continues while the page advertises a `next` link.

use futures_util::{Stream, stream};
use log::{debug, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::client::Pco;
use crate::error::Error;
use crate::http::{Request, Transport};

pub const DEFAULT_PER_PAGE: usize = 25;
pub const MAX_PER_PAGE: usize = 100;

/// Page-level `meta` keys copied onto every record.
const RECORD_META_KEYS: [&str; 2] = ["can_include", "parent"];

/// Where a listing starts and how many items each page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub offset: usize,
    pub per_page: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            offset: 0,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Paging {
    /// Keeps `per_page` within what the service accepts.
    pub fn clamped(self) -> Self {
        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        if per_page != self.per_page {
            warn!(
                "per_page {} is outside 1-{}, using {}",
                self.per_page, MAX_PER_PAGE, per_page
            );
        }
        Self { per_page, ..self }
    }
}

/// One listed object with its related objects inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Value,
    pub included: Vec<Value>,
    pub meta: Map<String, Value>,
}

/// The parts of a listing response the iterator reads.
#[derive(Debug, Deserialize)]
struct Page {
    data: Vec<Value>,
    #[serde(default)]
    included: Option<Vec<Value>>,
    #[serde(default)]
    meta: Option<Map<String, Value>>,
    #[serde(default)]
    links: Option<Map<String, Value>>,
}

impl Page {
    fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value)
            .map_err(|e| Error::UnexpectedRequest(format!("Malformed page response: {}", e)))
    }

    fn has_next(&self) -> bool {
        self.links
            .as_ref()
            .and_then(|links| links.get("next"))
            .is_some_and(|next| !next.is_null())
    }

    fn into_records(self) -> Vec<Record> {
        let included = self.included.unwrap_or_default();
        let index = IncludeIndex::new(&included);

        let meta: Map<String, Value> = self
            .meta
            .map(|meta| {
                RECORD_META_KEYS
                    .iter()
                    .filter_map(|key| meta.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();

        self.data
            .into_iter()
            .map(|item| {
                let included = index.resolve_relationships(&item);
                Record {
                    data: item,
                    included,
                    meta: meta.clone(),
                }
            })
            .collect()
    }
}

/// (type, id) of a resource object or resource reference, as JSON text so
/// that only equal values match: the id `7` is not the id `"7"`.
fn resource_key(value: &Value) -> Option<(String, String)> {
    let part = |field: &str| {
        value
            .get(field)
            .filter(|v| !v.is_null())
            .map(Value::to_string)
    };
    Some((part("type")?, part("id")?))
}

/// Included objects by (type, id), built once per page.
struct IncludeIndex<'a> {
    by_key: HashMap<(String, String), Vec<&'a Value>>,
}

impl<'a> IncludeIndex<'a> {
    fn new(included: &'a [Value]) -> Self {
        let mut by_key: HashMap<_, Vec<&Value>> = HashMap::new();
        for object in included {
            if let Some(key) = resource_key(object) {
                by_key.entry(key).or_default().push(object);
            }
        }
        Self { by_key }
    }

    fn resolve(&self, reference: &Value) -> &[&'a Value] {
        resource_key(reference)
            .and_then(|key| self.by_key.get(&key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Included objects referenced by `item`, in relationship order and,
    /// within a to-many relationship, in list order.
    fn resolve_relationships(&self, item: &Value) -> Vec<Value> {
        let Some(relationships) = item.get("relationships").and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        for relationship in relationships.values() {
            match relationship.get("data") {
                Some(Value::Array(references)) => {
                    for reference in references {
                        resolved.extend(self.resolve(reference).iter().map(|v| (*v).clone()));
                    }
                }
                Some(reference @ Value::Object(_)) => {
                    resolved.extend(self.resolve(reference).iter().map(|v| (*v).clone()));
                }
                _ => {}
            }
        }
        resolved
    }
}

enum State {
    Fetching {
        offset: usize,
    },
    Emitting {
        records: std::vec::IntoIter<Record>,
        next_offset: Option<usize>,
    },
    Exhausted,
}

struct Pager<'a, T: Transport> {
    client: &'a Pco<T>,
    url: String,
    per_page: usize,
    params: Vec<(String, String)>,
}

impl<T: Transport> Pager<'_, T> {
    async fn fetch(&self, offset: usize) -> Result<Page, Error> {
        debug!(
            "Fetching page at offset {} (per_page {}) from {}",
            offset, self.per_page, self.url
        );

        let mut request = Request::new(Method::GET, self.url.as_str())
            .with_param("offset", offset)
            .with_param("per_page", self.per_page);
        request.params.extend(self.params.iter().cloned());

        Page::from_value(self.client.request_json(request).await?)
    }

    fn next_offset(&self, offset: usize) -> Option<usize> {
        let next = offset.checked_add(self.per_page);
        if next.is_none() {
            warn!(
                "Offset {} + {} overflows, stopping iteration of {}",
                offset, self.per_page, self.url
            );
        }
        next
    }

    /// Drives the state machine until it has an item to yield or is done.
    async fn step(&self, mut state: State) -> Option<(Result<Record, Error>, State)> {
        loop {
            state = match state {
                State::Exhausted => return None,
                State::Emitting {
                    mut records,
                    next_offset,
                } => {
                    if let Some(record) = records.next() {
                        return Some((
                            Ok(record),
                            State::Emitting {
                                records,
                                next_offset,
                            },
                        ));
                    }
                    match next_offset {
                        Some(offset) => State::Fetching { offset },
                        None => State::Exhausted,
                    }
                }
                State::Fetching { offset } => match self.fetch(offset).await {
                    Ok(page) => {
                        let next_offset = if page.has_next() {
                            self.next_offset(offset)
                        } else {
                            None
                        };
                        State::Emitting {
                            records: page.into_records().into_iter(),
                            next_offset,
                        }
                    }
                    Err(e) => {
                        debug!("Stopping iteration of {} at offset {}: {}", self.url, offset, e);
                        return Some((Err(e), State::Exhausted));
                    }
                },
            };
        }
    }
}

/// A lazy stream of records over every page of `url`. The stream ends after
/// the last page, or right after yielding the first error.
pub(crate) fn paginate<'a, T: Transport>(
    client: &'a Pco<T>,
    url: String,
    paging: Paging,
    params: Vec<(String, String)>,
) -> impl Stream<Item = Result<Record, Error>> + 'a {
    let paging = paging.clamped();
    let pager = Pager {
        client,
        url,
        per_page: paging.per_page,
        params,
    };
    let start = State::Fetching {
        offset: paging.offset,
    };

    stream::unfold((pager, start), |(pager, state)| async move {
        let (item, state) = pager.step(state).await?;
        Some((item, (pager, state)))
    })
}
