//! Target-schema handling: parsing, the type/field index used for dotted
//! path inference, and the deprecation analyzer.

pub mod deprecation;

use anyhow::Result;
use graphql_parser::schema::{Definition, Document, Type, TypeDefinition};
use rustc_hash::FxHashMap;

use crate::types::OperationKind;

pub use deprecation::{
    DeprecationRule, DeprecationRuleSet, DeprecationSummary, MemberKind, RuleAction,
};

pub fn parse_schema_text(text: &str) -> Result<Document<'static, String>> {
    Ok(graphql_parser::schema::parse_schema::<String>(text)
        .map_err(|e| anyhow::anyhow!("schema parse error: {e}"))?
        .into_static())
}

/// Object/interface type → field → named result type, plus the root
/// operation types. Everything the transformer needs to walk a selection
/// set with a type stack.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    fields: FxHashMap<String, FxHashMap<String, String>>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
}

impl SchemaIndex {
    pub fn from_document(document: &Document<'static, String>) -> Self {
        let mut index = SchemaIndex::default();

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema_def) => {
                    index.query_type = schema_def.query.clone();
                    index.mutation_type = schema_def.mutation.clone();
                    index.subscription_type = schema_def.subscription.clone();
                }
                Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                    let entry = index.fields.entry(object.name.clone()).or_default();
                    for field in &object.fields {
                        entry.insert(field.name.clone(), named_type(&field.field_type));
                    }
                }
                Definition::TypeDefinition(TypeDefinition::Interface(interface)) => {
                    let entry = index.fields.entry(interface.name.clone()).or_default();
                    for field in &interface.fields {
                        entry.insert(field.name.clone(), named_type(&field.field_type));
                    }
                }
                _ => {}
            }
        }

        index
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_field(&self, type_name: &str, field: &str) -> bool {
        self.fields
            .get(type_name)
            .is_some_and(|fields| fields.contains_key(field))
    }

    pub fn field_type(&self, type_name: &str, field: &str) -> Option<&str> {
        self.fields
            .get(type_name)?
            .get(field)
            .map(String::as_str)
    }

    /// Root type for an operation kind; fragments carry their own type
    /// condition instead.
    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => {
                Some(self.query_type.as_deref().unwrap_or("Query"))
            }
            OperationKind::Mutation => {
                Some(self.mutation_type.as_deref().unwrap_or("Mutation"))
            }
            OperationKind::Subscription => {
                Some(self.subscription_type.as_deref().unwrap_or("Subscription"))
            }
            OperationKind::Fragment => None,
        }
    }
}

fn named_type(ty: &Type<'static, String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) | Type::NonNullType(inner) => named_type(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
        type Query {
            venture(id: ID!): Venture
            ventures(limit: Int): [Venture!]!
        }

        type Venture {
            id: ID!
            logoUrl: String
            profile: Profile
        }

        type Profile {
            logoUrl: String
        }

        interface Node {
            id: ID!
        }
    "#;

    #[test]
    fn index_maps_fields_to_named_types() {
        let doc = parse_schema_text(SCHEMA).unwrap();
        let index = SchemaIndex::from_document(&doc);
        assert_eq!(index.field_type("Query", "venture"), Some("Venture"));
        assert_eq!(index.field_type("Query", "ventures"), Some("Venture"));
        assert_eq!(index.field_type("Venture", "profile"), Some("Profile"));
        assert!(index.has_field("Node", "id"));
        assert!(!index.has_field("Venture", "missing"));
    }

    #[test]
    fn default_root_types_apply_without_schema_definition() {
        let doc = parse_schema_text(SCHEMA).unwrap();
        let index = SchemaIndex::from_document(&doc);
        assert_eq!(index.root_type(OperationKind::Query), Some("Query"));
        assert_eq!(index.root_type(OperationKind::Fragment), None);
    }

    #[test]
    fn schema_definition_overrides_roots() {
        let doc = parse_schema_text(
            "schema { query: RootQuery }\ntype RootQuery { ping: String }",
        )
        .unwrap();
        let index = SchemaIndex::from_document(&doc);
        assert_eq!(index.root_type(OperationKind::Query), Some("RootQuery"));
    }

    #[test]
    fn invalid_schema_is_an_error() {
        assert!(parse_schema_text("type {").is_err());
    }
}
