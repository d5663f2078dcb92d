use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use log::debug;
use tokio::sync::watch;
use url::Url;

use super::codec::{self, ParamMap, DESCRIPTOR_KEYS};
use super::SessionDescriptor;

/// The single arbitration point for the shared timeline.
///
/// Writes are whole-value publishes: a reader sees either the old descriptor
/// or the new one, never a mix of fields.
pub trait DescriptorStore: Send + Sync {
    fn read(&self) -> SessionDescriptor;
    /// Publish a new session, replacing whatever was there.
    fn write(&self, descriptor: &SessionDescriptor);
    fn clear(&self);
    fn subscribe(&self) -> watch::Receiver<SessionDescriptor>;
}

/// A descriptor store whose physical form is the query string of a shareable
/// link. Query keys the codec does not own are left alone on write and dropped
/// on clear.
pub struct LinkStore {
    link: Mutex<Url>,
    published: watch::Sender<SessionDescriptor>,
}

impl LinkStore {
    pub fn new(link: &str) -> Result<Self> {
        let url = Url::parse(link).with_context(|| format!("invalid link '{link}'"))?;
        let descriptor = codec::decode(&query_params(&url));
        let (published, _) = watch::channel(descriptor);
        Ok(Self {
            link: Mutex::new(url),
            published,
        })
    }

    /// The link a viewer would share or open right now.
    pub fn current_link(&self) -> String {
        self.lock().to_string()
    }

    /// Replace the whole link, e.g. when a viewer opens one that was shared
    /// with them.
    pub fn navigate(&self, link: &str) -> Result<()> {
        let url = Url::parse(link).with_context(|| format!("invalid link '{link}'"))?;
        let descriptor = codec::decode(&query_params(&url));
        let mut current = self.lock();
        *current = url;
        self.publish(descriptor);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Url> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callers hold the link lock, so the last link written is also the last
    /// descriptor published.
    fn publish(&self, descriptor: SessionDescriptor) {
        self.published.send_if_modified(|current| {
            if *current == descriptor {
                false
            } else {
                debug!("descriptor published: {:?}", descriptor);
                *current = descriptor;
                true
            }
        });
    }
}

impl DescriptorStore for LinkStore {
    fn read(&self) -> SessionDescriptor {
        *self.published.borrow()
    }

    fn write(&self, descriptor: &SessionDescriptor) {
        let encoded = codec::encode(descriptor);
        let mut url = self.lock();
        let mut merged: Vec<(String, String)> = query_pairs(&url)
            .into_iter()
            .filter(|(key, _)| !DESCRIPTOR_KEYS.contains(&key.as_str()))
            .collect();
        merged.extend(encoded.iter().map(|(k, v)| (k.clone(), v.clone())));
        set_query(&mut url, &merged);
        self.publish(codec::decode(&query_params(&url)));
    }

    fn clear(&self) {
        let pairs: Vec<(String, String)> = codec::clear().into_iter().collect();
        let mut url = self.lock();
        set_query(&mut url, &pairs);
        self.publish(SessionDescriptor::home());
    }

    fn subscribe(&self) -> watch::Receiver<SessionDescriptor> {
        self.published.subscribe()
    }
}

fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn query_params(url: &Url) -> ParamMap {
    // Later duplicates win, same as a browser's URLSearchParams.get on a merged link.
    query_pairs(url).into_iter().collect()
}

fn set_query(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;

    #[test]
    fn empty_link_reads_home() {
        let store = LinkStore::new("https://example.test/").unwrap();
        assert_eq!(store.read(), SessionDescriptor::home());
    }

    #[test]
    fn opening_a_shared_link_decodes_it() {
        let store =
            LinkStore::new("https://example.test/?mode=timer&start=1000&duration=60000").unwrap();
        assert_eq!(store.read(), SessionDescriptor::timer(1_000, 60_000));
    }

    #[test]
    fn write_replaces_previous_session_fields() {
        let store =
            LinkStore::new("https://example.test/?mode=timer&start=1000&duration=60000").unwrap();
        store.write(&SessionDescriptor::alarm(5_000));

        let link = store.current_link();
        assert!(link.contains("mode=alarm"));
        assert!(link.contains("target=5000"));
        assert!(!link.contains("duration"));
        assert!(!link.contains("start"));
        assert_eq!(store.read(), SessionDescriptor::alarm(5_000));
    }

    #[test]
    fn write_keeps_foreign_query_keys() {
        let store = LinkStore::new("https://example.test/?theme=dark").unwrap();
        store.write(&SessionDescriptor::stopwatch(42));

        let link = store.current_link();
        assert!(link.contains("theme=dark"));
        assert!(link.contains("mode=stopwatch"));
        assert!(link.contains("start=42"));
    }

    #[test]
    fn clear_empties_the_query() {
        let store = LinkStore::new("https://example.test/?theme=dark&mode=stopwatch&start=1")
            .unwrap();
        store.clear();
        assert_eq!(store.current_link(), "https://example.test/");
        assert_eq!(store.read().mode, SessionMode::Home);
    }

    #[test]
    fn subscribers_see_whole_descriptors() {
        let store = LinkStore::new("https://example.test/").unwrap();
        let mut rx = store.subscribe();

        store.write(&SessionDescriptor::timer(10, 20));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionDescriptor::timer(10, 20));

        // Same value again is not a change.
        store.write(&SessionDescriptor::timer(10, 20));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn concurrent_writers_leave_link_and_descriptor_in_step() {
        use std::{sync::Arc, thread};

        for _ in 0..200 {
            let store = Arc::new(LinkStore::new("https://example.test/?theme=dark").unwrap());
            let writers: Vec<_> = (0..4)
                .map(|i| {
                    let store = store.clone();
                    thread::spawn(move || {
                        for n in 1..=50 {
                            match (i + n) % 3 {
                                0 => store.write(&SessionDescriptor::stopwatch(n)),
                                1 => store.write(&SessionDescriptor::alarm(1_000 + i)),
                                _ => store.clear(),
                            }
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            let reopened = LinkStore::new(&store.current_link()).unwrap();
            assert_eq!(reopened.read(), store.read());
        }
    }

    #[test]
    fn navigate_swaps_the_whole_link() {
        let store = LinkStore::new("https://example.test/").unwrap();
        store
            .navigate("https://example.test/?mode=stopwatch&start=77")
            .unwrap();
        assert_eq!(store.read(), SessionDescriptor::stopwatch(77));
        assert!(store.navigate("not a link").is_err());
        assert_eq!(store.read(), SessionDescriptor::stopwatch(77));
    }
}
