//! Flattens nested table schemas into dotted column descriptors.

use crate::types::{SchemaField, TableField};

/// Whether a field holds nested columns rather than a value.
fn is_record(field: &TableField) -> bool {
    matches!(field.field_type.as_str(), "RECORD" | "STRUCT")
}

/// Flatten a nested schema, replacing each record by its prefixed children.
pub fn flatten_schema(fields: &[TableField]) -> Vec<SchemaField> {
    let mut out = Vec::with_capacity(fields.len());
    flatten_into(fields, "", &mut out);
    out
}

fn flatten_into(fields: &[TableField], prefix: &str, out: &mut Vec<SchemaField>) {
    for field in fields {
        let name = format!("{}{}", prefix, field.name);
        if is_record(field) {
            // A record with no children contributes nothing.
            flatten_into(&field.fields, &format!("{}.", name), out);
        } else {
            out.push(SchemaField {
                name,
                field_type: field.field_type.clone(),
                mode: field.mode.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, ty: &str, mode: &str) -> TableField {
        TableField {
            name: name.into(),
            field_type: ty.into(),
            mode: mode.into(),
            fields: Vec::new(),
            description: None,
        }
    }

    fn record(name: &str, mode: &str, fields: Vec<TableField>) -> TableField {
        TableField {
            name: name.into(),
            field_type: "RECORD".into(),
            mode: mode.into(),
            fields,
            description: None,
        }
    }

    #[test]
    fn flat_fields_pass_through() {
        let out = flatten_schema(&[
            leaf("event_date", "STRING", "NULLABLE"),
            leaf("event_timestamp", "INTEGER", "NULLABLE"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].name, "event_timestamp");
        assert_eq!(out[1].field_type, "INTEGER");
    }

    #[test]
    fn nested_records_use_dotted_paths() {
        let schema = vec![
            leaf("event_name", "STRING", "NULLABLE"),
            record(
                "event_params",
                "REPEATED",
                vec![
                    leaf("key", "STRING", "NULLABLE"),
                    record(
                        "value",
                        "NULLABLE",
                        vec![
                            leaf("string_value", "STRING", "NULLABLE"),
                            leaf("int_value", "INTEGER", "NULLABLE"),
                        ],
                    ),
                ],
            ),
        ];

        let names: Vec<String> = flatten_schema(&schema).into_iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "event_name",
                "event_params.key",
                "event_params.value.string_value",
                "event_params.value.int_value",
            ]
        );
    }

    #[test]
    fn empty_record_is_dropped() {
        let out = flatten_schema(&[
            record("privacy_info", "NULLABLE", Vec::new()),
            leaf("user_id", "STRING", "NULLABLE"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "user_id");
    }

    #[test]
    fn struct_alias_is_treated_as_record() {
        let mut s = record("device", "NULLABLE", vec![leaf("category", "STRING", "NULLABLE")]);
        s.field_type = "STRUCT".into();
        let out = flatten_schema(&[s]);
        assert_eq!(out[0].to_string(), "device.category (STRING, NULLABLE)");
    }
}
