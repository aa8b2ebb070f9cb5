//! # Mobilogram Writer Module
//!
//! Writes expanded features to Parquet using a "Wide" schema: one row per
//! feature, with the per-frame trace and the summed mobilogram stored as
//! list columns.
//!
//! ## Schema Columns
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | feature_id | UInt64 | Id of the input feature |
//! | raw_file | Utf8 | Raw data file name |
//! | mz | Float64 | Intensity-weighted m/z |
//! | retention_time | Float64 | Apex retention time (s) |
//! | mobility | Float64 | Apex mobility |
//! | height | Float64 | Apex frame intensity |
//! | area | Float64 | Area over retention time |
//! | num_scans | UInt32 | Mobility scans in the series |
//! | rt_array | List<Float64> | Retention time per frame |
//! | frame_intensity_array | List<Float32> | Summed intensity per frame |
//! | mobility_array | List<Float64> | Summed mobilogram bins |
//! | intensity_array | List<Float32> | Summed mobilogram intensities |

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float32Builder, Float64Builder, ListBuilder, StringBuilder, UInt32Builder, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use crate::series::FeatureRow;

/// Version string stored in the file footer.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Footer key of the format version.
pub const KEY_FORMAT_VERSION: &str = "ims_expander:format_version";
/// Footer key of the creation timestamp.
pub const KEY_CREATED: &str = "ims_expander:created";
/// Footer key of the serialized expansion settings.
pub const KEY_SETTINGS: &str = "ims_expander:settings";

/// Column names for the mobilogram schema
pub mod mobilogram_columns {
    /// Input feature id
    pub const FEATURE_ID: &str = "feature_id";
    /// Raw data file name
    pub const RAW_FILE: &str = "raw_file";
    /// Representative m/z
    pub const MZ: &str = "mz";
    /// Apex retention time
    pub const RETENTION_TIME: &str = "retention_time";
    /// Apex mobility
    pub const MOBILITY: &str = "mobility";
    /// Apex frame intensity
    pub const HEIGHT: &str = "height";
    /// Area over retention time
    pub const AREA: &str = "area";
    /// Number of mobility scans
    pub const NUM_SCANS: &str = "num_scans";
    /// Retention time per frame
    pub const RT_ARRAY: &str = "rt_array";
    /// Summed intensity per frame
    pub const FRAME_INTENSITY_ARRAY: &str = "frame_intensity_array";
    /// Summed mobilogram bins
    pub const MOBILITY_ARRAY: &str = "mobility_array";
    /// Summed mobilogram intensities
    pub const INTENSITY_ARRAY: &str = "intensity_array";
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, false)))
}

/// Creates the feature mobilogram Arrow schema.
///
/// # Example
///
/// ```
/// use ims_expander::mobilogram_writer::create_mobilogram_schema;
///
/// let schema = create_mobilogram_schema();
/// assert_eq!(schema.fields().len(), 12);
/// ```
pub fn create_mobilogram_schema() -> Schema {
    use mobilogram_columns::*;

    let fields = vec![
        Field::new(FEATURE_ID, DataType::UInt64, false),
        Field::new(RAW_FILE, DataType::Utf8, false),
        Field::new(MZ, DataType::Float64, false),
        Field::new(RETENTION_TIME, DataType::Float64, false),
        Field::new(MOBILITY, DataType::Float64, false),
        Field::new(HEIGHT, DataType::Float64, false),
        Field::new(AREA, DataType::Float64, false),
        Field::new(NUM_SCANS, DataType::UInt32, false),
        Field::new(RT_ARRAY, list_of(DataType::Float64), false),
        Field::new(FRAME_INTENSITY_ARRAY, list_of(DataType::Float32), false),
        Field::new(MOBILITY_ARRAY, list_of(DataType::Float64), false),
        Field::new(INTENSITY_ARRAY, list_of(DataType::Float32), false),
    ];

    let mut metadata = HashMap::new();
    metadata.insert(KEY_FORMAT_VERSION.to_string(), EXPORT_FORMAT_VERSION.to_string());
    metadata.insert(
        "ims_expander:schema_description".to_string(),
        "Wide-format expanded ion mobility features with per-frame traces and summed mobilograms"
            .to_string(),
    );

    Schema::new(fields).with_metadata(metadata)
}

/// Errors that can occur during mobilogram writing
#[derive(Debug, thiserror::Error)]
pub enum MobilogramWriterError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Settings could not be serialized into the footer
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Configuration for the mobilogram writer
#[derive(Debug, Clone)]
pub struct MobilogramWriterConfig {
    /// Compression level (ZSTD, 1-22, default 3)
    pub compression_level: i32,

    /// Target row group size
    pub row_group_size: usize,

    /// Data page size in bytes
    pub data_page_size: usize,

    /// Whether to write statistics for columns
    pub write_statistics: bool,
}

impl Default for MobilogramWriterConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            row_group_size: 1000,
            data_page_size: 1024 * 1024,
            write_statistics: true,
        }
    }
}

impl MobilogramWriterConfig {
    fn to_writer_properties(&self, metadata: &HashMap<String, String>) -> WriterProperties {
        let compression = Compression::ZSTD(
            ZstdLevel::try_new(self.compression_level).unwrap_or(ZstdLevel::default()),
        );

        let statistics = if self.write_statistics {
            EnabledStatistics::Chunk
        } else {
            EnabledStatistics::None
        };

        let mut builder = WriterProperties::builder()
            .set_compression(compression)
            .set_data_page_size_limit(self.data_page_size)
            .set_statistics_enabled(statistics)
            .set_max_row_group_size(self.row_group_size);

        // Array columns are high-cardinality; dictionaries only cost space
        for col in [
            mobilogram_columns::RT_ARRAY,
            mobilogram_columns::FRAME_INTENSITY_ARRAY,
            mobilogram_columns::MOBILITY_ARRAY,
            mobilogram_columns::INTENSITY_ARRAY,
        ] {
            builder = builder.set_column_dictionary_enabled(
                parquet::schema::types::ColumnPath::new(vec![col.to_string()]),
                false,
            );
        }

        let kv_metadata: Vec<KeyValue> = metadata
            .iter()
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: Some(v.clone()),
            })
            .collect();

        builder.set_key_value_metadata(Some(kv_metadata)).build()
    }
}

/// Streaming writer for feature mobilogram Parquet files
pub struct MobilogramWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: Arc<Schema>,
    features_written: usize,
    data_points_written: usize,
}

impl MobilogramWriter<File> {
    /// Create a new writer to a file path
    pub fn new_file<P: AsRef<Path>>(
        path: P,
        settings: &crate::config::ExpanderConfig,
        config: MobilogramWriterConfig,
    ) -> Result<Self, MobilogramWriterError> {
        let file = File::create(path)?;
        Self::new(file, settings, config)
    }
}

impl<W: Write + Send> MobilogramWriter<W> {
    /// Create a new writer to any Write implementation. The expansion
    /// settings are embedded in the file footer.
    pub fn new(
        writer: W,
        settings: &crate::config::ExpanderConfig,
        config: MobilogramWriterConfig,
    ) -> Result<Self, MobilogramWriterError> {
        let schema = Arc::new(create_mobilogram_schema());

        let mut footer = HashMap::new();
        footer.insert(KEY_FORMAT_VERSION.to_string(), EXPORT_FORMAT_VERSION.to_string());
        footer.insert(KEY_CREATED.to_string(), chrono::Utc::now().to_rfc3339());
        footer.insert(KEY_SETTINGS.to_string(), serde_json::to_string(settings)?);
        let props = config.to_writer_properties(&footer);

        let arrow_writer = ArrowWriter::try_new(writer, schema.clone(), Some(props))?;

        Ok(Self {
            writer: arrow_writer,
            schema,
            features_written: 0,
            data_points_written: 0,
        })
    }

    /// Write a batch of feature rows
    pub fn write_features(&mut self, rows: &[FeatureRow]) -> Result<(), MobilogramWriterError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut id_builder = UInt64Builder::new();
        let mut file_builder = StringBuilder::new();
        let mut mz_builder = Float64Builder::new();
        let mut rt_builder = Float64Builder::new();
        let mut mobility_builder = Float64Builder::new();
        let mut height_builder = Float64Builder::new();
        let mut area_builder = Float64Builder::new();
        let mut scans_builder = UInt32Builder::new();
        // Fields with nullable=false to match the schema
        let f64_item = || Field::new("item", DataType::Float64, false);
        let f32_item = || Field::new("item", DataType::Float32, false);
        let mut rt_array = ListBuilder::new(Float64Builder::new()).with_field(f64_item());
        let mut frame_intensity_array = ListBuilder::new(Float32Builder::new()).with_field(f32_item());
        let mut mobility_array = ListBuilder::new(Float64Builder::new()).with_field(f64_item());
        let mut intensity_array = ListBuilder::new(Float32Builder::new()).with_field(f32_item());

        for row in rows {
            let summary = &row.summary;
            id_builder.append_value(row.feature_id);
            file_builder.append_value(&row.raw_file.name);
            mz_builder.append_value(summary.mz);
            rt_builder.append_value(summary.retention_time);
            mobility_builder.append_value(summary.mobility);
            height_builder.append_value(summary.height);
            area_builder.append_value(summary.area);
            scans_builder.append_value(summary.num_scans as u32);

            rt_array.values().append_slice(&row.series.retention_times());
            rt_array.append(true);
            for intensity in row.series.frame_intensities() {
                frame_intensity_array.values().append_value(intensity as f32);
            }
            frame_intensity_array.append(true);

            mobility_array.values().append_slice(&row.mobilogram.mobilities);
            mobility_array.append(true);
            for &intensity in &row.mobilogram.intensities {
                intensity_array.values().append_value(intensity as f32);
            }
            intensity_array.append(true);

            self.data_points_written += row.series.num_scans();
        }

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(id_builder.finish()),
            Arc::new(file_builder.finish()),
            Arc::new(mz_builder.finish()),
            Arc::new(rt_builder.finish()),
            Arc::new(mobility_builder.finish()),
            Arc::new(height_builder.finish()),
            Arc::new(area_builder.finish()),
            Arc::new(scans_builder.finish()),
            Arc::new(rt_array.finish()),
            Arc::new(frame_intensity_array.finish()),
            Arc::new(mobility_array.finish()),
            Arc::new(intensity_array.finish()),
        ];

        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        self.features_written += rows.len();

        Ok(())
    }

    /// Flush any buffered data and finalize the file
    pub fn finish(self) -> Result<MobilogramWriterStats, MobilogramWriterError> {
        let file_metadata = self.writer.close()?;

        Ok(MobilogramWriterStats {
            features_written: self.features_written,
            data_points_written: self.data_points_written,
            row_groups_written: file_metadata.row_groups.len(),
        })
    }

    /// Get current statistics
    pub fn stats(&self) -> MobilogramWriterStats {
        MobilogramWriterStats {
            features_written: self.features_written,
            data_points_written: self.data_points_written,
            row_groups_written: 0,
        }
    }
}

/// Statistics from a completed mobilogram write operation
#[derive(Debug, Clone)]
pub struct MobilogramWriterStats {
    /// Number of features written
    pub features_written: usize,
    /// Total number of series data points written
    pub data_points_written: usize,
    /// Number of row groups written
    pub row_groups_written: usize,
}

impl std::fmt::Display for MobilogramWriterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Wrote {} features ({} data points) in {} row groups",
            self.features_written, self.data_points_written, self.row_groups_written
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpanderConfig;
    use crate::series::test_support::point;
    use crate::series::{bin_mobilogram, FeatureSummary, IonMobilogramTimeSeries};
    use crate::source::RawDataFileRef;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    fn feature_row(feature_id: u64) -> FeatureRow {
        let series = IonMobilogramTimeSeries::from_points(vec![
            point(0, 1.0, 0, 1.0, 100.0, 5.0),
            point(0, 1.0, 1, 0.9, 100.0, 7.0),
            point(1, 2.0, 0, 1.0, 100.0, 3.0),
        ])
        .unwrap();
        FeatureRow {
            feature_id,
            raw_file: RawDataFileRef::new("run.d"),
            summary: FeatureSummary::from_series(&series),
            mobilogram: bin_mobilogram(&series, None),
            series,
        }
    }

    #[test]
    fn test_mobilogram_schema() {
        let schema = create_mobilogram_schema();
        assert!(schema.field_with_name(mobilogram_columns::FEATURE_ID).is_ok());
        assert!(schema.field_with_name(mobilogram_columns::MOBILITY_ARRAY).is_ok());
        assert_eq!(
            schema.metadata().get(KEY_FORMAT_VERSION).map(String::as_str),
            Some(EXPORT_FORMAT_VERSION)
        );
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.parquet");

        let mut writer = MobilogramWriter::new_file(
            &path,
            &ExpanderConfig::default(),
            MobilogramWriterConfig::default(),
        )
        .unwrap();
        writer.write_features(&[]).unwrap();
        writer.write_features(&[feature_row(1), feature_row(2)]).unwrap();
        assert_eq!(writer.stats().features_written, 2);

        let stats = writer.finish().unwrap();
        assert_eq!(stats.features_written, 2);
        assert_eq!(stats.data_points_written, 6);
        assert_eq!(stats.row_groups_written, 1);

        let file = File::open(&path).unwrap();
        let reader = SerializedFileReader::new(file).unwrap();
        let kv = reader
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        assert!(kv.iter().any(|e| e.key == KEY_SETTINGS));
        assert!(kv.iter().any(|e| e.key == KEY_CREATED));

        let file = File::open(&path).unwrap();
        let batches: Vec<RecordBatch> = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
