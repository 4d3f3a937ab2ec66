//! Builders for test records.

use linkweave_core::{Record, Value};

/// Fluent builder for a [`Record`]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
    next_value: usize,
}

impl RecordBuilder {
    /// A record labelled after its id, of class `onto:Thing`
    pub fn new(id: &str) -> Self {
        Self {
            record: Record::new(id, format!("Record {}", id), "onto:Thing"),
            next_value: 0,
        }
    }

    /// Set the label
    pub fn label(mut self, label: &str) -> Self {
        self.record.label = label.to_string();
        self
    }

    /// Set the class
    pub fn class(mut self, class: &str) -> Self {
        self.record.class = class.to_string();
        self
    }

    /// Add a direct reference with a generated value id
    pub fn links_to(self, target: &str) -> Self {
        let id = self.value_id();
        self.link(&id, target)
    }

    /// Add a direct reference with the given value id
    pub fn link(mut self, value_id: &str, target: &str) -> Self {
        self.record = self.record.with_value(Value::direct(value_id, "onto:hasLink", target));
        self.next_value += 1;
        self
    }

    /// Add a text value mentioning every target as a placeholder
    pub fn mentions(mut self, value_id: &str, targets: &[&str]) -> Self {
        let text = targets
            .iter()
            .map(|t| format!("<a class=\"salsah-link\" href=\"IRI:{}:IRI\">{}</a>", t, t))
            .collect::<Vec<_>>()
            .join(" and ");
        self.record = self
            .record
            .with_value(Value::embedded(value_id, "onto:hasText", format!("<p>See {}</p>", text)));
        self.next_value += 1;
        self
    }

    /// Add a plain value that references nothing
    pub fn plain(mut self, value_id: &str, payload: serde_json::Value) -> Self {
        self.record = self.record.with_value(Value::other(value_id, "onto:hasValue", payload));
        self.next_value += 1;
        self
    }

    /// Finish the record
    pub fn build(self) -> Record {
        self.record
    }

    fn value_id(&self) -> String {
        format!("{}-v{}", self.record.local_id, self.next_value)
    }
}

/// A chain `ids[0] -> ids[1] -> ... -> ids[n-1]`
pub fn chain(ids: &[&str]) -> Vec<Record> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| match ids.get(i + 1) {
            Some(next) => RecordBuilder::new(id).links_to(next).build(),
            None => RecordBuilder::new(id).build(),
        })
        .collect()
}

/// A ring `ids[0] -> ids[1] -> ... -> ids[0]`
pub fn ring(ids: &[&str]) -> Vec<Record> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| RecordBuilder::new(id).links_to(ids[(i + 1) % ids.len()]).build())
        .collect()
}
