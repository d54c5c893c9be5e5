//! End-to-end scenarios through the public `DatasetAccess` API

use ndarray::{Array, ArrayD, IxDyn};
use serde_json::{json, Value};
use zarrpublish::{
    layout::resolve,
    CodecConfig, Dataset, DatasetAccess, EdgeChunkPolicy, EncodingOverrides, NdArraySource,
    PublishError, Variable, VariableEncoding,
};

fn grid_dataset() -> Dataset {
    let data: ArrayD<f64> =
        Array::from_shape_vec(IxDyn(&[4, 4]), (0..16).map(f64::from).collect()).unwrap();
    let source = NdArraySource::new(data, vec!["y", "x"])
        .unwrap()
        .with_attr("units", "m");
    Dataset::new().with_attr("title", "scenario").with_variable(
        "grid",
        Variable::new(source).with_encoding(VariableEncoding::default().with_chunks(vec![2, 2])),
    )
}

fn register(dataset: Dataset) -> DatasetAccess {
    DatasetAccess::register(dataset, &EncodingOverrides::new()).unwrap()
}

#[test]
fn test_two_by_two_chunked_grid() {
    let access = register(grid_dataset());

    assert_eq!(
        Value::Object(access.variable_attrs("grid").unwrap().clone()),
        json!({"units": "m", "_ARRAY_DIMENSIONS": ["y", "x"]})
    );

    let zarray = serde_json::to_value(access.variable_metadata("grid").unwrap()).unwrap();
    assert_eq!(zarray["chunks"], json!([2, 2]));
    assert_eq!(zarray["shape"], json!([4, 4]));
    assert_eq!(zarray["compressor"], Value::Null);
    assert_eq!(zarray["filters"], Value::Null);
    assert_eq!(zarray["dtype"], json!("<f8"));
    assert_eq!(zarray["order"], json!("C"));
    assert_eq!(zarray["zarr_format"], json!(2));

    assert_eq!(resolve("0.0", &[2, 2]).unwrap(), vec![0..2, 0..2]);
    let chunk = access.get_chunk("grid", "0.0").unwrap();
    assert_eq!(chunk.len(), 2 * 2 * 8);
    let values: Vec<f64> = chunk
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![0.0, 1.0, 4.0, 5.0]);
}

#[test]
fn test_out_of_range_chunk_is_empty_not_an_error() {
    let access = register(grid_dataset());
    assert!(access.get_chunk("grid", "5.5").unwrap().is_empty());
}

#[test]
fn test_out_of_range_chunk_padded() {
    let access = register(grid_dataset()).with_edge_chunk_policy(EdgeChunkPolicy::Pad);
    assert_eq!(access.get_chunk("grid", "5.5").unwrap(), vec![0u8; 32]);
}

#[test]
fn test_unknown_variable() {
    let access = register(grid_dataset());
    assert!(matches!(
        access.get_chunk("nonexistent", "0.0"),
        Err(PublishError::UnknownVariable(ref name)) if name == "nonexistent"
    ));
}

#[test]
fn test_non_integer_coordinate() {
    let access = register(grid_dataset());
    assert!(matches!(
        access.get_chunk("grid", "a.b"),
        Err(PublishError::MalformedCoordinate(_))
    ));
    assert!(matches!(
        access.get_chunk("grid", "0.0.0"),
        Err(PublishError::MalformedCoordinate(_))
    ));
}

#[test]
fn test_unchunked_variable_is_single_chunk() {
    let source =
        NdArraySource::new(ArrayD::<i16>::zeros(IxDyn(&[3, 5, 2])), vec!["t", "y", "x"]).unwrap();
    let access = register(Dataset::new().with_variable("v", Variable::new(source)));

    let meta = access.variable_metadata("v").unwrap();
    assert_eq!(meta.chunks, meta.shape);
    assert_eq!(access.chunk_grid("v").unwrap(), vec![1, 1, 1]);
    assert_eq!(access.get_chunk("v", "0.0.0").unwrap().len(), 3 * 5 * 2 * 2);
}

#[test]
fn test_metadata_document_is_stable() {
    let access = register(grid_dataset());
    let first = access.metadata_document_json();
    let second = access.metadata_document_json();
    assert_eq!(first, second);

    let doc: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(doc["zarr_consolidated_format"], json!(1));
    assert_eq!(doc["metadata"][".zgroup"], json!({"zarr_format": 2}));
    assert_eq!(doc["metadata"][".zattrs"], json!({"title": "scenario"}));
    assert_eq!(doc["metadata"]["grid/.zarray"]["chunks"], json!([2, 2]));
}

#[test]
fn test_compressed_and_filtered_chunk() {
    let mut overrides = EncodingOverrides::new();
    overrides.insert(
        "grid".to_string(),
        VariableEncoding::default()
            .with_filter(CodecConfig::new("delta").with("dtype", "<f8"))
            .with_compressor(CodecConfig::new("zstd").with("level", 3)),
    );
    let access = DatasetAccess::register(grid_dataset(), &overrides).unwrap();

    let encoded = access.get_chunk("grid", "1.1").unwrap();
    assert_eq!(encoded, access.get_chunk("grid", "1.1").unwrap());

    let decoded = zstd::decode_all(&encoded[..]).unwrap();
    let values: Vec<f64> = decoded
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
        .collect();
    // chunk holds 10, 11, 14, 15
    assert_eq!(values, vec![10.0, 1.0, 3.0, 1.0]);
}

#[test]
fn test_object_variable_needs_object_codec() {
    let names = Array::from_shape_vec(IxDyn(&[2]), vec!["a".to_string(), "bc".to_string()]).unwrap();
    let source = NdArraySource::new(names, vec!["station"]).unwrap();

    let access = register(Dataset::new().with_variable("name", Variable::new(source.clone())));
    assert_eq!(access.variable_metadata("name").unwrap().dtype.to_string(), "|O");
    assert!(matches!(
        access.get_chunk("name", "0"),
        Err(PublishError::UnencodableElementKind(_))
    ));

    let variable = Variable::new(source)
        .with_encoding(VariableEncoding::default().with_filter(CodecConfig::new("vlen-utf8")));
    let access = register(Dataset::new().with_variable("name", variable));
    assert_eq!(
        access.get_chunk("name", "0").unwrap(),
        vec![2, 0, 0, 0, 1, 0, 0, 0, b'a', 2, 0, 0, 0, b'b', b'c']
    );
}

#[test]
fn test_dimension_mismatch_fails_registration() {
    let source = NdArraySource::new(ArrayD::<f64>::zeros(IxDyn(&[4, 4])), vec!["y", "x"]).unwrap();
    let variable =
        Variable::new(source).with_encoding(VariableEncoding::default().with_chunks(vec![2, 2, 2]));
    assert!(matches!(
        DatasetAccess::register(Dataset::new().with_variable("v", variable), &EncodingOverrides::new()),
        Err(PublishError::InvalidDimensions(_))
    ));
}
