//! Expected table schemas for the keyed store.

use polars::prelude::*;

/// Catalog table: one row per listed instrument.
pub struct CatalogSchema;

impl CatalogSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("sid".into(), DataType::UInt32),
            Field::new("symbol".into(), DataType::String),
            Field::new("asset_name".into(), DataType::String),
        ])
    }

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        validate_against(&Self::schema(), df)
    }
}

/// Daily bar table: naive time index plus OHLCV.
pub struct DailyBarSchema;

impl DailyBarSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(
                "date".into(),
                DataType::Datetime(TimeUnit::Milliseconds, None),
            ),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::UInt64),
        ])
    }

    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        validate_against(&Self::schema(), df)
    }
}

/// Splits table: passed through to the adjustments sink verbatim.
pub struct SplitsSchema;

impl SplitsSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("sid".into(), DataType::UInt32),
            Field::new("ratio".into(), DataType::Float64),
            Field::new(
                "effective_date".into(),
                DataType::Datetime(TimeUnit::Milliseconds, None),
            ),
        ])
    }

    /// An empty but fully typed splits table.
    pub fn empty_frame() -> DataFrame {
        DataFrame::empty_with_schema(&Self::schema())
    }
}

fn validate_against(expected: &Schema, df: &DataFrame) -> Result<(), SchemaError> {
    let actual = df.schema();

    for field in expected.iter_fields() {
        let actual_dtype = actual
            .get(field.name())
            .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
        if actual_dtype != field.dtype() {
            return Err(SchemaError::TypeMismatch {
                column: field.name().to_string(),
                expected: field.dtype().clone(),
                actual: actual_dtype.clone(),
            });
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_schema_validates_well_formed_frame() {
        let df = df!(
            "sid" => &[7203u32],
            "symbol" => &["7203.JP"],
            "asset_name" => &["TOYOTA MOTOR"],
        )
        .unwrap();
        assert!(CatalogSchema::validate(&df).is_ok());
    }

    #[test]
    fn catalog_schema_rejects_missing_column() {
        let df = df!(
            "sid" => &[7203u32],
            "symbol" => &["7203.JP"],
        )
        .unwrap();
        let result = CatalogSchema::validate(&df);
        assert!(matches!(result, Err(SchemaError::MissingColumn(_))));
    }

    #[test]
    fn catalog_schema_rejects_wrong_sid_type() {
        let df = df!(
            "sid" => &["7203"],
            "symbol" => &["7203.JP"],
            "asset_name" => &["TOYOTA MOTOR"],
        )
        .unwrap();
        let result = CatalogSchema::validate(&df);
        assert!(matches!(result, Err(SchemaError::TypeMismatch { .. })));
    }

    #[test]
    fn empty_splits_frame_is_typed() {
        let df = SplitsSchema::empty_frame();
        assert_eq!(df.height(), 0);
        assert_eq!(
            df.column("ratio").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(
            df.column("effective_date").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
    }
}
