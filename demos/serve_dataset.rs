//! Example: publish a small synthetic dataset over HTTP
//!
//! Run with: cargo run --example serve_dataset [config.json]
//!
//! Then open it from Python with
//! `zarr.open_consolidated(fsspec.get_mapper("http://localhost:9000"))`.

use chrono::Utc;
use ndarray::{Array, IxDyn};
use zarrpublish::{
    logging::init_tracing, serve, CodecConfig, Dataset, DatasetAccess, EncodingOverrides,
    NdArraySource, ServeConfig, Variable, VariableEncoding,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServeConfig::from_json_file(path)?,
        None => ServeConfig::default(),
    };
    init_tracing(&config.log_level);

    let (ny, nx) = (180, 360);
    let temperature = Array::from_shape_fn(IxDyn(&[ny, nx]), |ix| {
        let lat = ix[0] as f64 - 90.0;
        288.0 - 30.0 * (lat.to_radians().sin()).powi(2)
    });
    let lat = Array::from_shape_fn(IxDyn(&[ny]), |ix| ix[0] as f64 - 89.5);
    let lon = Array::from_shape_fn(IxDyn(&[nx]), |ix| ix[0] as f64 - 179.5);

    let dataset = Dataset::new()
        .with_attr("title", "Synthetic surface temperature")
        .with_attr("created", Utc::now())
        .with_variable(
            "temperature",
            Variable::new(
                NdArraySource::new(temperature, vec!["lat", "lon"])?
                    .with_attr("units", "K")
                    .with_attr("valid_range", vec![180.0f64, 330.0]),
            )
            .with_encoding(
                VariableEncoding::default()
                    .with_chunks(vec![90, 90])
                    .with_compressor(CodecConfig::new("zlib").with("level", 4)),
            ),
        )
        .with_variable(
            "lat",
            Variable::new(NdArraySource::new(lat, vec!["lat"])?.with_attr("units", "degrees_north")),
        )
        .with_variable(
            "lon",
            Variable::new(NdArraySource::new(lon, vec!["lon"])?.with_attr("units", "degrees_east")),
        );

    let access = DatasetAccess::register(dataset, &EncodingOverrides::new())?;
    serve(access, &config).await?;
    Ok(())
}
