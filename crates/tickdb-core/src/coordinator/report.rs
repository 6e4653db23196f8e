//! `dump` and `querystate`: read-only views over up sites

use super::Coordinator;
use crate::event::{Event, LockRow};
use crate::sink::EventSink;
use tickdb_primitives::{SiteId, VarId};

impl Coordinator {
    /// Lock holders at every up site
    pub(super) fn query_state(&self, sink: &mut dyn EventSink) {
        for authority in self.authorities.values().filter(|a| a.is_up()) {
            sink.emit(Event::LockTable {
                site: authority.id(),
                entries: authority.lock_table().into_iter().map(LockRow::from).collect(),
            });
        }
    }

    /// Committed values at every up site
    pub(super) fn dump_all(&self, sink: &mut dyn EventSink) {
        for authority in self.authorities.values().filter(|a| a.is_up()) {
            sink.emit(Event::Dump {
                site: authority.id(),
                values: authority.committed_values(),
            });
        }
    }

    pub(super) fn dump_site(&self, site: SiteId, sink: &mut dyn EventSink) {
        match self.authorities.get(&site) {
            Some(authority) if authority.is_up() => sink.emit(Event::Dump {
                site,
                values: authority.committed_values(),
            }),
            _ => sink.emit(Event::DumpUnavailable { site }),
        }
    }

    /// `var` at every up site hosting it
    pub(super) fn dump_variable(&self, var: &VarId, sink: &mut dyn EventSink) {
        for authority in self.authorities.values().filter(|a| a.is_up()) {
            if let Some(value) = authority.committed_value(var) {
                sink.emit(Event::Dump {
                    site: authority.id(),
                    values: vec![(var.clone(), value)],
                });
            }
        }
    }
}
