//! End-to-end tests for the content-stream interpreter.
//!
//! Each test renders a small content stream against an in-memory object
//! store and inspects the calls recorded on a `RecordingSurface`.

use ductus_core::model::objects::dict_from;
use ductus_core::{
    MATRIX_IDENTITY, ObjectStore, PDFDict, PDFObject, PDFStream, PageInterpreter,
    RecordingSurface, RenderError, RenderOptions, ResourceManager, Result, SurfaceCall,
};

fn nums(values: &[f64]) -> PDFObject {
    PDFObject::Array(values.iter().map(|v| PDFObject::Real(*v)).collect())
}

fn render_with(
    content: &[u8],
    resources: PDFDict,
    store: &ObjectStore,
    options: &RenderOptions,
) -> (Result<()>, RecordingSurface) {
    let mut rm = ResourceManager::new();
    let mut surface = RecordingSurface::with_bounds((0.0, 0.0, 100.0, 100.0));
    let result = PageInterpreter::new(store, &mut rm, &mut surface, options).render_page(
        content,
        resources,
        MATRIX_IDENTITY,
    );
    (result, surface)
}

fn render(content: &[u8]) -> (Result<()>, RecordingSurface) {
    render_with(
        content,
        PDFDict::new(),
        &ObjectStore::new(),
        &RenderOptions::default(),
    )
}

fn trace(surface: &RecordingSurface) -> String {
    surface
        .calls()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_fill(call: &SurfaceCall) -> bool {
    matches!(call, SurfaceCall::FillPath { .. })
}

fn is_stroke(call: &SurfaceCall) -> bool {
    matches!(call, SurfaceCall::StrokePath { .. })
}

// ============================================================================
// Paths and clipping
// ============================================================================

#[test]
fn test_painting_ends_the_path() {
    let (result, surface) = render(b"1 1 m 2 2 l f 3 3 l f");
    result.unwrap();
    assert_eq!(surface.count(is_fill), 1);
    match &surface.calls()[1] {
        SurfaceCall::FillPath { path, .. } => assert_eq!(path.segments().len(), 2),
        other => panic!("expected a fill, got {other}"),
    }
}

#[test]
fn test_clip_is_committed_by_n() {
    let (result, surface) = render(b"0 0 10 10 re W n");
    result.unwrap();
    assert_eq!(surface.count(is_fill) + surface.count(is_stroke), 0);
    assert_eq!(
        surface.calls(),
        &[SurfaceCall::ClipChanged {
            bounds: Some((0.0, 0.0, 10.0, 10.0)),
            paths: 1,
        }]
    );
}

#[test]
fn test_clips_accumulate_until_restore() {
    let (result, surface) = render(b"q 0 0 50 50 re W n 10 10 50 50 re W* n Q");
    result.unwrap();
    let clips: Vec<_> = surface
        .calls()
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::ClipChanged { bounds, paths } => Some((*bounds, *paths)),
            _ => None,
        })
        .collect();
    assert_eq!(
        clips,
        vec![
            (Some((0.0, 0.0, 50.0, 50.0)), 1),
            (Some((10.0, 10.0, 50.0, 50.0)), 2),
            (None, 0),
        ]
    );
}

#[test]
fn test_transform_reported_once_per_change() {
    let (result, surface) = render(b"0 0 1 1 re f 0 0 1 1 re f 2 0 0 2 0 0 cm 0 0 1 1 re f");
    result.unwrap();
    let transforms: Vec<_> = surface
        .calls()
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::SetTransform { ctm } => Some(*ctm),
            _ => None,
        })
        .collect();
    assert_eq!(
        transforms,
        vec![MATRIX_IDENTITY, (2.0, 0.0, 0.0, 2.0, 0.0, 0.0)]
    );
}

// ============================================================================
// Graphics state
// ============================================================================

#[test]
fn test_ext_gstate_parameters() {
    let gs = dict_from([
        ("Type", PDFObject::name("ExtGState")),
        ("LW", PDFObject::Real(3.0)),
        ("ca", PDFObject::Real(0.5)),
    ]);
    let resources = dict_from([(
        "ExtGState",
        PDFObject::Dict(dict_from([("GS0", PDFObject::Dict(gs))])),
    )]);
    let (result, surface) = render_with(
        b"/GS0 gs 0 0 m 1 1 l B",
        resources,
        &ObjectStore::new(),
        &RenderOptions::default(),
    );
    result.unwrap();
    let calls = surface.calls();
    match (&calls[1], &calls[2]) {
        (
            SurfaceCall::FillPath { paint: fill, .. },
            SurfaceCall::StrokePath { style, paint: stroke, .. },
        ) => {
            assert_eq!(fill.alpha, 0.5);
            assert_eq!(stroke.alpha, 1.0);
            assert_eq!(style.width, 3.0);
        }
        _ => panic!("unexpected calls:\n{}", trace(&surface)),
    }
}

#[test]
fn test_missing_ext_gstate_is_recoverable() {
    let (result, surface) = render(b"/GS9 gs 0 0 1 1 re f");
    result.unwrap();
    assert_eq!(surface.count(is_fill), 1);
}

#[test]
fn test_restore_returns_color() {
    let (result, surface) = render(b"q 1 0 0 rg Q 0 0 1 1 re f");
    result.unwrap();
    match &surface.calls()[1] {
        SurfaceCall::FillPath { paint, .. } => assert_eq!(paint.argb(), 0xFF00_0000),
        other => panic!("expected a fill, got {other}"),
    }
}

// ============================================================================
// Error handling
// ============================================================================

#[test]
fn test_missing_colorspace_aborts() {
    let (result, surface) = render(b"0 0 1 1 re f /CS9 cs 0 0 1 1 re f");
    assert!(matches!(
        result,
        Err(RenderError::UnresolvableResource {
            category: "ColorSpace",
            ..
        })
    ));
    // drawing before the failure is kept
    assert_eq!(surface.count(is_fill), 1);
}

#[test]
fn test_reversed_lab_range_is_an_error() {
    let lab = PDFObject::Array(vec![
        PDFObject::name("Lab"),
        PDFObject::Dict(dict_from([
            ("WhitePoint", nums(&[0.9505, 1.0, 1.089])),
            ("Range", nums(&[100.0, -100.0, -100.0, 100.0])),
        ])),
    ]);
    let resources = dict_from([(
        "ColorSpace",
        PDFObject::Dict(dict_from([("L", lab)])),
    )]);
    let (result, surface) = render_with(
        b"/L cs 0 0 1 1 re f",
        resources,
        &ObjectStore::new(),
        &RenderOptions::default(),
    );
    assert!(matches!(
        result,
        Err(RenderError::InvalidColorSpaceDefinition(_))
    ));
    assert_eq!(surface.count(is_fill), 0);
}

#[test]
fn test_unknown_operator_inside_compatibility_section() {
    let (result, surface) = render(b"BX 1 2 frob EX 0 0 1 1 re f");
    result.unwrap();
    assert_eq!(surface.count(is_fill), 1);

    let (result, _) = render(b"EX");
    assert!(matches!(
        result,
        Err(RenderError::MalformedOperatorSequence { .. })
    ));
}

#[test]
fn test_operand_errors_follow_strictness() {
    let (result, _) = render(b"(abc) w 0 0 1 1 re S");
    assert!(matches!(
        result,
        Err(RenderError::MalformedOperatorSequence { .. })
    ));

    let lenient = RenderOptions::default().with_strict_operands(false);
    let (result, surface) = render_with(
        b"(abc) w 0 0 1 1 re S",
        PDFDict::new(),
        &ObjectStore::new(),
        &lenient,
    );
    result.unwrap();
    assert_eq!(surface.count(is_stroke), 1);
}

#[test]
fn test_unterminated_inline_image() {
    let (result, _) = render(b"BI /W 1 /H 1 /BPC 8 /CS /G ID \x00\x01\x02");
    assert!(matches!(
        result,
        Err(RenderError::UnterminatedInlineImage { .. })
    ));
}

// ============================================================================
// Resource reuse across pages
// ============================================================================

#[test]
fn test_shared_colorspace_follows_each_page_defaults() {
    let mut store = ObjectStore::new();
    let indexed = store.insert(
        4,
        PDFObject::Array(vec![
            PDFObject::name("Indexed"),
            PDFObject::name("DeviceRGB"),
            PDFObject::Int(0),
            PDFObject::String(vec![0x80, 0x80, 0x80]),
        ]),
    );
    let cal_rgb = PDFObject::Array(vec![
        PDFObject::name("CalRGB"),
        PDFObject::Dict(dict_from([
            ("WhitePoint", nums(&[0.9505, 1.0, 1.089])),
        ])),
    ]);
    let first_page = dict_from([(
        "ColorSpace",
        PDFObject::Dict(dict_from([
            ("CS0", indexed.clone()),
            ("DefaultRGB", cal_rgb),
        ])),
    )]);
    let second_page = dict_from([(
        "ColorSpace",
        PDFObject::Dict(dict_from([("CS0", indexed)])),
    )]);

    let options = RenderOptions::default();
    let mut rm = ResourceManager::new();
    let mut fills = Vec::new();
    for resources in [first_page, second_page] {
        let mut surface = RecordingSurface::with_bounds((0.0, 0.0, 100.0, 100.0));
        PageInterpreter::new(&store, &mut rm, &mut surface, &options)
            .render_page(b"/CS0 cs 0 sc 0 0 1 1 re f", resources, MATRIX_IDENTITY)
            .unwrap();
        fills.extend(surface.calls().iter().filter_map(|c| match c {
            SurfaceCall::FillPath { paint, .. } => Some(paint.argb()),
            _ => None,
        }));
    }
    assert_eq!(fills.len(), 2);
    // only the second page draws the plain device color
    assert_ne!(fills[0], 0xFF80_8080);
    assert_eq!(fills[1], 0xFF80_8080);
}

// ============================================================================
// XObjects
// ============================================================================

#[test]
fn test_image_inside_form_uses_form_space() {
    let mut store = ObjectStore::new();
    let image = store.insert(
        7,
        PDFStream::new(
            dict_from([
                ("Subtype", PDFObject::name("Image")),
                ("Width", PDFObject::Int(2)),
                ("Height", PDFObject::Int(1)),
                ("BitsPerComponent", PDFObject::Int(8)),
                ("ColorSpace", PDFObject::name("DeviceGray")),
            ]),
            vec![0x00, 0xFF],
        ),
    );
    let form = store.insert(
        8,
        PDFStream::new(
            dict_from([
                ("Subtype", PDFObject::name("Form")),
                ("BBox", nums(&[0.0, 0.0, 1.0, 1.0])),
                ("Matrix", nums(&[20.0, 0.0, 0.0, 10.0, 5.0, 5.0])),
                (
                    "Resources",
                    PDFObject::Dict(dict_from([(
                        "XObject",
                        PDFObject::Dict(dict_from([("Im0", image)])),
                    )])),
                ),
            ]),
            b"/Im0 Do".to_vec(),
        ),
    );
    let resources = dict_from([(
        "XObject",
        PDFObject::Dict(dict_from([("Fm0", form)])),
    )]);
    let (result, surface) =
        render_with(b"/Fm0 Do", resources, &store, &RenderOptions::default());
    result.unwrap();
    let placements: Vec<_> = surface
        .calls()
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::DrawRaster {
                width,
                height,
                placement,
                ..
            } => Some((*width, *height, *placement)),
            _ => None,
        })
        .collect();
    assert_eq!(
        placements,
        vec![(2, 1, (20.0, 0.0, 0.0, 10.0, 5.0, 5.0))]
    );
}

// ============================================================================
// Trace format
// ============================================================================

#[test]
fn test_trace_snapshot() {
    let (result, surface) = render(b"q 1 0 0 rg 10 10 20 20 re f Q 0 0 1 RG 2 w 0 0 m 5 5 l S");
    result.unwrap();
    insta::assert_snapshot!(trace(&surface), @r"
    set_transform (1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    fill_path NonZero #ffff0000 [10 10 m 30 10 l 30 30 l 10 30 l h]
    stroke_path w=2 #ff0000ff [0 0 m 5 5 l]
    ");
}
