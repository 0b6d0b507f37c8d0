//! Functions, color spaces and shadings built from PDF objects.

use ductus_core::interp::{ColorSpaceResolver, ResourceScopes};
use ductus_core::model::objects::dict_from;
use ductus_core::model::Rgb;
use ductus_core::shading::PixelRect;
use ductus_core::{
    MATRIX_IDENTITY, ObjectStore, PDFDict, PDFFunction, PDFObject, PDFStream, RenderError,
    ResourceManager, Shading,
};
use std::sync::Arc;

fn nums(values: &[f64]) -> PDFObject {
    PDFObject::Array(values.iter().map(|v| PDFObject::Real(*v)).collect())
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
    }
}

fn exponential_dict(c0: &[f64], c1: &[f64], n: f64) -> PDFDict {
    dict_from([
        ("FunctionType", PDFObject::Int(2)),
        ("Domain", nums(&[0.0, 1.0])),
        ("C0", nums(c0)),
        ("C1", nums(c1)),
        ("N", PDFObject::Real(n)),
    ])
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_sampled_function_from_stream() {
    let store = ObjectStore::new();
    let stream = PDFStream::new(
        dict_from([
            ("FunctionType", PDFObject::Int(0)),
            ("Domain", nums(&[0.0, 1.0])),
            ("Range", nums(&[0.0, 1.0])),
            ("Size", PDFObject::Array(vec![PDFObject::Int(3)])),
            ("BitsPerSample", PDFObject::Int(8)),
        ]),
        vec![0, 128, 255],
    );
    let f = PDFFunction::from_object(&PDFObject::from(stream), &store).unwrap();
    assert_eq!((f.num_inputs(), f.num_outputs()), (1, 1));
    // an input landing exactly on a sample returns that sample
    assert_eq!(f.evaluate(&[0.5])[0], 128.0 / 255.0);
    // inputs outside the domain are clipped
    assert_eq!(f.evaluate(&[2.0])[0], 1.0);
}

#[test]
fn test_exponential_linear_interpolation() {
    let store = ObjectStore::new();
    let dict = exponential_dict(&[0.0, 0.0, 0.0], &[1.0, 0.5, 0.0], 1.0);
    let f = PDFFunction::from_object(&PDFObject::Dict(dict), &store).unwrap();
    assert_close(&f.evaluate(&[0.5]), &[0.5, 0.25, 0.0]);
    assert_close(&f.evaluate(&[0.0]), &[0.0, 0.0, 0.0]);
}

#[test]
fn test_stitching_through_references() {
    let mut store = ObjectStore::new();
    let low = store.insert(1, exponential_dict(&[0.0], &[0.0], 1.0));
    let high = store.insert(2, exponential_dict(&[1.0], &[1.0], 1.0));
    let dict = dict_from([
        ("FunctionType", PDFObject::Int(3)),
        ("Domain", nums(&[0.0, 1.0])),
        ("Functions", PDFObject::Array(vec![low, high])),
        ("Bounds", nums(&[0.5])),
        ("Encode", nums(&[0.0, 1.0, 0.0, 1.0])),
    ]);
    let f = PDFFunction::from_object(&PDFObject::Dict(dict), &store).unwrap();
    assert_eq!(f.evaluate(&[0.4])[0], 0.0);
    assert_eq!(f.evaluate(&[0.6])[0], 1.0);
}

#[test]
fn test_unknown_function_type_is_invalid() {
    let store = ObjectStore::new();
    let dict = dict_from([
        ("FunctionType", PDFObject::Int(7)),
        ("Domain", nums(&[0.0, 1.0])),
    ]);
    let err = PDFFunction::from_object(&PDFObject::Dict(dict), &store).unwrap_err();
    assert!(matches!(err, RenderError::InvalidFunctionDefinition(_)));
}

#[test]
fn test_sampled_function_with_huge_size_is_invalid() {
    let store = ObjectStore::new();
    let stream = PDFStream::new(
        dict_from([
            ("FunctionType", PDFObject::Int(0)),
            ("Domain", nums(&[0.0, 1.0, 0.0, 1.0])),
            ("Range", nums(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0])),
            (
                "Size",
                PDFObject::Array(vec![
                    PDFObject::Int(2_147_483_648),
                    PDFObject::Int(2_147_483_648),
                ]),
            ),
            ("BitsPerSample", PDFObject::Int(8)),
        ]),
        vec![0u8; 64],
    );
    let err = PDFFunction::from_object(&PDFObject::from(stream), &store).unwrap_err();
    assert!(matches!(err, RenderError::InvalidFunctionDefinition(_)));
}

#[test]
fn test_nan_domain_is_invalid() {
    let store = ObjectStore::new();
    let mut dict = exponential_dict(&[0.0], &[1.0], 1.0);
    dict.insert("Domain".into(), nums(&[0.0, f64::NAN]));
    let err = PDFFunction::from_object(&PDFObject::Dict(dict), &store).unwrap_err();
    assert!(matches!(err, RenderError::InvalidFunctionDefinition(_)));
}

// ============================================================================
// Color spaces
// ============================================================================

fn with_resolver<T>(
    store: &ObjectStore,
    colorspaces: Vec<(&str, PDFObject)>,
    f: impl FnOnce(&mut ColorSpaceResolver<'_>) -> T,
) -> T {
    let scopes = ResourceScopes::new(dict_from([(
        "ColorSpace",
        PDFObject::Dict(dict_from(colorspaces)),
    )]));
    let mut cache = ResourceManager::new();
    let mut resolver = ColorSpaceResolver::new(store, &scopes, &mut cache, 16);
    f(&mut resolver)
}

#[test]
fn test_indexed_gray() {
    let store = ObjectStore::new();
    let indexed = PDFObject::Array(vec![
        PDFObject::name("Indexed"),
        PDFObject::name("DeviceGray"),
        PDFObject::Int(1),
        PDFObject::String(hex::decode("00FF").unwrap()),
    ]);
    with_resolver(&store, vec![("CS0", indexed)], |resolver| {
        let cs = resolver.resolve_name("CS0").unwrap();
        assert_eq!(cs.ncomponents(), 1);
        assert_eq!(cs.to_rgb(&[0.0]).unwrap(), Rgb::gray(0.0));
        assert_eq!(cs.to_rgb(&[1.0]).unwrap(), Rgb::gray(1.0));
        // out-of-range indices clamp to hival
        assert_eq!(cs.to_rgb(&[5.0]).unwrap(), Rgb::gray(1.0));
    });
}

#[test]
fn test_shared_descriptor_resolves_once() {
    let mut store = ObjectStore::new();
    let lab = store.insert(
        3,
        PDFObject::Array(vec![
            PDFObject::name("Lab"),
            PDFObject::Dict(dict_from([("WhitePoint", nums(&[0.9505, 1.0, 1.089]))])),
        ]),
    );
    with_resolver(
        &store,
        vec![("A", lab.clone()), ("B", lab)],
        |resolver| {
            let a = resolver.resolve_name("A").unwrap();
            let b = resolver.resolve_name("B").unwrap();
            assert!(Arc::ptr_eq(&a, &b));
        },
    );
}

#[test]
fn test_reversed_icc_range_is_invalid() {
    let mut store = ObjectStore::new();
    let profile = store.insert(
        9,
        PDFStream::new(
            dict_from([("N", PDFObject::Int(3)), ("Range", nums(&[0.0, 1.0, 1.0, 0.0, 0.0, 1.0]))]),
            Vec::<u8>::new(),
        ),
    );
    let icc = PDFObject::Array(vec![PDFObject::name("ICCBased"), profile]);
    with_resolver(&store, vec![("I", icc)], |resolver| {
        assert!(matches!(
            resolver.resolve_name("I"),
            Err(RenderError::InvalidColorSpaceDefinition(_))
        ));
    });
}

#[test]
fn test_separation_through_function() {
    let store = ObjectStore::new();
    let sep = PDFObject::Array(vec![
        PDFObject::name("Separation"),
        PDFObject::name("Spot"),
        PDFObject::name("DeviceRGB"),
        PDFObject::Dict(exponential_dict(&[1.0, 1.0, 1.0], &[1.0, 0.0, 0.0], 1.0)),
    ]);
    with_resolver(&store, vec![("Spot", sep)], |resolver| {
        let cs = resolver.resolve_name("Spot").unwrap();
        assert_eq!(cs.default_color().as_slice(), &[1.0]);
        assert_eq!(cs.to_rgb(&[1.0]).unwrap(), Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(cs.to_rgb(&[0.0]).unwrap(), Rgb::new(1.0, 1.0, 1.0));
    });
}

// ============================================================================
// Shadings
// ============================================================================

fn gray_ramp() -> Arc<PDFFunction> {
    Arc::new(PDFFunction::exponential(vec![0.0, 1.0], None, vec![0.0], vec![1.0], 1.0).unwrap())
}

#[test]
fn test_radial_with_equal_circles_paints_nothing_inside_domain() {
    let store = ObjectStore::new();
    let dict = dict_from([
        ("ShadingType", PDFObject::Int(3)),
        ("Coords", nums(&[5.0, 5.0, 3.0, 5.0, 5.0, 3.0])),
    ]);
    let shading = Arc::new(
        Shading::from_dict(&dict, &store, ductus_core::ColorSpace::device_gray(), Some(gray_ramp()))
            .unwrap(),
    );
    let ctx = shading.paint_context(MATRIX_IDENTITY, false).unwrap();
    assert_eq!(ctx.sample(5.0, 5.0), 0);
    assert_eq!(ctx.sample(50.0, 50.0), 0);
}

#[test]
fn test_axial_row_under_scale() {
    let store = ObjectStore::new();
    let dict = dict_from([
        ("ShadingType", PDFObject::Int(2)),
        ("Coords", nums(&[0.0, 0.0, 1.0, 0.0])),
        (
            "Extend",
            PDFObject::Array(vec![PDFObject::Bool(true), PDFObject::Bool(true)]),
        ),
    ]);
    let shading = Arc::new(
        Shading::from_dict(&dict, &store, ductus_core::ColorSpace::device_gray(), Some(gray_ramp()))
            .unwrap(),
    );
    // the unit axis spans 10 device pixels
    let ctx = shading
        .paint_context((10.0, 0.0, 0.0, 10.0, 0.0, 0.0), false)
        .unwrap();
    let mut row = vec![0u32; 12];
    ctx.fill(
        PixelRect {
            x: -1,
            y: 0,
            width: 12,
            height: 1,
        },
        &mut row,
    );
    // extended ends take the end colors
    assert_eq!(row[0], 0xFF00_0000);
    assert_eq!(row[11], 0xFFFF_FFFF);
    // gray rises monotonically along the axis
    let blue: Vec<u32> = row.iter().map(|p| p & 0xFF).collect();
    assert!(blue.windows(2).all(|w| w[0] <= w[1]), "{blue:?}");
}
