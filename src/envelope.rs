//! Pagination envelopes.
//!
//! Each envelope is a fixed-shape object template parameterized by the schema
//! of one page item. The `Data*` variants are the flattened shapes where only
//! `links`/`data` stay at the top level and everything else moves under `meta`.

use crate::schema::{ObjectNode, SchemaNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Paginator,
    LengthAwarePaginator,
    CursorPaginator,
    DataPaginator,
    DataCursorPaginator,
}

impl EnvelopeKind {
    pub fn name(&self) -> &'static str {
        match self {
            EnvelopeKind::Paginator => "Paginator",
            EnvelopeKind::LengthAwarePaginator => "LengthAwarePaginator",
            EnvelopeKind::CursorPaginator => "CursorPaginator",
            EnvelopeKind::DataPaginator => "DataPaginator",
            EnvelopeKind::DataCursorPaginator => "DataCursorPaginator",
        }
    }

    /// Component name shared by every operation paginating `inner`.
    pub fn component_name(&self, inner: &str) -> String {
        format!("{}_{}", inner, self.name())
    }

    /// Wraps `item` into this envelope's object template.
    pub fn wrap(&self, item: SchemaNode) -> SchemaNode {
        match self {
            EnvelopeKind::Paginator => simple_template(item).into_node(),
            EnvelopeKind::LengthAwarePaginator => length_aware_template(item).into_node(),
            EnvelopeKind::CursorPaginator => cursor_template(item).into_node(),
            EnvelopeKind::DataPaginator => {
                let mut length_aware = length_aware_template(item.clone());
                let links = length_aware.properties.shift_remove("links");
                let data = length_aware.properties.shift_remove("data");
                let mut simple = simple_template(item);
                simple.properties.shift_remove("links");
                simple.properties.shift_remove("data");

                let mut envelope = ObjectNode::new();
                if let Some(links) = links {
                    envelope.insert("links", links, false);
                }
                if let Some(data) = data {
                    envelope.insert("data", data, false);
                }
                envelope.insert(
                    "meta",
                    SchemaNode::one_of(vec![length_aware.into_node(), simple.into_node()]),
                    false,
                );
                envelope.into_node()
            }
            EnvelopeKind::DataCursorPaginator => {
                let mut cursor = cursor_template(item);
                let data = cursor.properties.shift_remove("data");

                let mut envelope = ObjectNode::new();
                if let Some(data) = data {
                    envelope.insert("data", data, false);
                }
                envelope.insert("meta", cursor.into_node(), false);
                envelope.into_node()
            }
        }
    }
}

fn fields(entries: &[(&str, SchemaNode)]) -> ObjectNode {
    let mut object = ObjectNode::new();
    for (name, schema) in entries {
        object.insert(name, schema.clone(), false);
    }
    object
}

fn page_link() -> SchemaNode {
    fields(&[
        ("url", SchemaNode::string()),
        ("label", SchemaNode::string()),
        ("active", SchemaNode::boolean()),
    ])
    .into_node()
}

fn simple_template(item: SchemaNode) -> ObjectNode {
    fields(&[
        ("current_page", SchemaNode::integer()),
        ("current_page_url", SchemaNode::string()),
        ("first_page_url", SchemaNode::string()),
        ("from", SchemaNode::integer()),
        ("next_page_url", SchemaNode::string()),
        ("path", SchemaNode::string()),
        ("per_page", SchemaNode::integer()),
        ("prev_page_url", SchemaNode::string()),
        ("to", SchemaNode::integer()),
        ("data", SchemaNode::array(item)),
    ])
}

fn length_aware_template(item: SchemaNode) -> ObjectNode {
    fields(&[
        ("current_page", SchemaNode::integer()),
        ("first_page_url", SchemaNode::string()),
        ("from", SchemaNode::integer()),
        ("last_page", SchemaNode::integer()),
        ("last_page_url", SchemaNode::string()),
        ("links", SchemaNode::array(page_link())),
        ("next_page_url", SchemaNode::string()),
        ("path", SchemaNode::string()),
        ("per_page", SchemaNode::integer()),
        ("prev_page_url", SchemaNode::string()),
        ("to", SchemaNode::integer()),
        ("total", SchemaNode::integer()),
        ("data", SchemaNode::array(item)),
    ])
}

fn cursor_template(item: SchemaNode) -> ObjectNode {
    fields(&[
        ("path", SchemaNode::string()),
        ("per_page", SchemaNode::integer()),
        ("next_cursor", SchemaNode::string()),
        ("next_page_url", SchemaNode::string()),
        ("prev_cursor", SchemaNode::string()),
        ("prev_page_url", SchemaNode::string()),
        ("data", SchemaNode::array(item)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OneOfNode;
    use pretty_assertions::assert_eq;

    fn keys(node: &ObjectNode) -> Vec<&str> {
        node.properties.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_length_aware_envelope() {
        let wrapped = EnvelopeKind::LengthAwarePaginator.wrap(SchemaNode::string());
        let object = wrapped.as_object().unwrap();

        assert_eq!(object.properties["data"], SchemaNode::array(SchemaNode::string()));

        let SchemaNode::Array(links) = &object.properties["links"] else {
            panic!("links should be an array");
        };
        let link = links.items.as_object().unwrap();
        assert_eq!(keys(link), vec!["url", "label", "active"]);
    }

    #[test]
    fn test_data_paginator_splits_meta() {
        let flat = EnvelopeKind::DataPaginator.wrap(SchemaNode::string());
        let object = flat.as_object().unwrap();
        assert_eq!(keys(object), vec!["links", "data", "meta"]);
        assert_eq!(object.properties["data"], SchemaNode::array(SchemaNode::string()));

        let SchemaNode::OneOf(OneOfNode { variants, .. }) = &object.properties["meta"] else {
            panic!("meta should be a oneOf");
        };
        assert_eq!(variants.len(), 2);

        let full = length_aware_template(SchemaNode::string());
        let expected: Vec<&str> = keys(&full)
            .into_iter()
            .filter(|key| *key != "links" && *key != "data")
            .collect();
        assert_eq!(keys(variants[0].as_object().unwrap()), expected);
        assert!(!variants[1].as_object().unwrap().properties.contains_key("data"));
    }

    #[test]
    fn test_data_cursor_paginator() {
        let flat = EnvelopeKind::DataCursorPaginator.wrap(SchemaNode::reference("Post"));
        let object = flat.as_object().unwrap();
        assert_eq!(keys(object), vec!["data", "meta"]);

        let meta = object.properties["meta"].as_object().unwrap();
        assert_eq!(
            keys(meta),
            vec!["path", "per_page", "next_cursor", "next_page_url", "prev_cursor", "prev_page_url"]
        );
    }

    #[test]
    fn test_component_name() {
        assert_eq!(EnvelopeKind::CursorPaginator.component_name("Post"), "Post_CursorPaginator");
        assert_eq!(
            EnvelopeKind::DataCursorPaginator.component_name("Post"),
            "Post_DataCursorPaginator"
        );
    }
}
