//! Schema-related data models.
//!
//! This module defines the catalog rows read during introspection and the
//! table descriptors rendered into the prompt snapshot.

use serde::{Deserialize, Serialize};

/// One row of column metadata from the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

impl CatalogColumn {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A table and its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema_name: String,
    pub table_name: String,
    /// `(name, declared_type)` pairs
    pub columns: Vec<(String, String)>,
}

impl TableDescriptor {
    /// Render as `schema.table(col1 type1, col2 type2, ...)`.
    pub fn render(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, data_type)| format!("{} {}", name, data_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}.{}({})", self.schema_name, self.table_name, columns)
    }
}

/// Ordered table descriptors, capped in tables and columns per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableDescriptor>,
}

impl SchemaSnapshot {
    /// Group catalog rows by table, preserving row order.
    ///
    /// Rows must arrive ordered by table and then by ordinal position, which
    /// is how every introspection query in this crate sorts them.
    pub fn from_catalog(rows: Vec<CatalogColumn>, max_tables: usize, max_columns: usize) -> Self {
        let mut tables: Vec<TableDescriptor> = Vec::new();

        for row in rows {
            let same_table = tables.last().is_some_and(|t| {
                t.schema_name == row.schema_name && t.table_name == row.table_name
            });

            if !same_table {
                if tables.len() == max_tables {
                    break;
                }
                tables.push(TableDescriptor {
                    schema_name: row.schema_name,
                    table_name: row.table_name,
                    columns: Vec::new(),
                });
            }

            if let Some(table) = tables.last_mut() {
                if table.columns.len() < max_columns {
                    table.columns.push((row.column_name, row.data_type));
                }
            }
        }

        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// One rendered table per line.
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(TableDescriptor::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(table: &str, name: &str, ty: &str) -> CatalogColumn {
        CatalogColumn::new("dbo", table, name, ty)
    }

    #[test]
    fn test_render_table() {
        let table = TableDescriptor {
            schema_name: "dbo".to_string(),
            table_name: "Orders".to_string(),
            columns: vec![
                ("Id".to_string(), "int".to_string()),
                ("Total".to_string(), "decimal".to_string()),
            ],
        };
        assert_eq!(table.render(), "dbo.Orders(Id int, Total decimal)");
    }

    #[test]
    fn test_from_catalog_groups_in_order() {
        let rows = vec![
            col("Customers", "Id", "int"),
            col("Customers", "Name", "nvarchar"),
            col("Orders", "Id", "int"),
        ];
        let snapshot = SchemaSnapshot::from_catalog(rows, 120, 20);
        assert_eq!(
            snapshot.render(),
            "dbo.Customers(Id int, Name nvarchar)\ndbo.Orders(Id int)"
        );
    }

    #[test]
    fn test_from_catalog_caps_tables_and_columns() {
        let mut rows = Vec::new();
        for t in 0..5 {
            for c in 0..30 {
                rows.push(col(&format!("t{}", t), &format!("c{}", c), "int"));
            }
        }
        let snapshot = SchemaSnapshot::from_catalog(rows, 3, 20);
        assert_eq!(snapshot.tables.len(), 3);
        assert!(snapshot.tables.iter().all(|t| t.columns.len() == 20));
        assert_eq!(snapshot.tables[2].table_name, "t2");
    }

    #[test]
    fn test_from_catalog_empty() {
        let snapshot = SchemaSnapshot::from_catalog(Vec::new(), 10, 10);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.render(), "");
    }
}
