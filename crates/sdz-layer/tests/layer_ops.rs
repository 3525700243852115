use sdz_core::{AssetId, MemoryResolver};
use sdz_layer::format::{decode, encode};
use sdz_layer::{
    AttrValue, Layer, LayerData, LayerError, LayerFormat, LayerRegistry, Prim, PrimBody,
    PrimPath, ReferenceKind, ReferenceSite,
};

fn scene() -> LayerData {
    LayerData {
        default_prim: Some("World".into()),
        ..LayerData::default()
    }
    .with_sublayer("lighting.sda")
    .with_prim(
        Prim::new("World")
            .with_type("Xform")
            .with_reference("props/chair.sda")
            .with_child(
                Prim::new("Floor")
                    .with_attribute("diffuse", AttrValue::Asset("tex/floor.png".into())),
            )
            .with_variant(
                "quality",
                "high",
                PrimBody {
                    payloads: vec![sdz_layer::CompositionArc::new("hires.sdc")],
                    ..PrimBody::default()
                },
            )
            .with_selection("quality", "high"),
    )
}

#[test]
fn test_sd_extension_opens_either_encoding() {
    let resolver = MemoryResolver::new()
        .with_file("/s/a.sd", encode(&scene(), LayerFormat::Text).unwrap())
        .with_file("/s/b.sd", encode(&scene(), LayerFormat::Binary).unwrap());
    let registry = LayerRegistry::new();

    let a = registry.open(&AssetId::new("/s/a.sd"), &resolver).unwrap();
    let b = registry.open(&AssetId::new("/s/b.sd"), &resolver).unwrap();
    assert_eq!(a.format(), LayerFormat::Text);
    assert_eq!(b.format(), LayerFormat::Binary);
    assert_eq!(a.data, b.data);
}

#[test]
fn test_rewrite_then_encode_preserves_edits() {
    let mut layer = Layer::new("/s/scene.sda", LayerFormat::Text, scene());
    for r in layer.references() {
        let flat = r.path.rsplit('/').next().unwrap_or(&r.path).to_string();
        layer.set_reference_path(&r.site, &flat).unwrap();
    }
    let bytes = layer.encode().unwrap();
    let (data, _) = decode(&bytes, None).unwrap();
    let paths: Vec<String> = data.references().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["lighting.sda", "chair.sda", "hires.sdc", "floor.png"]);
}

#[test]
fn test_reference_sites_are_addressable() {
    let refs = scene().references();
    let kinds: Vec<ReferenceKind> = refs.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ReferenceKind::Sublayer,
            ReferenceKind::Reference,
            ReferenceKind::Payload,
            ReferenceKind::AssetField,
        ]
    );
    assert_eq!(refs[0].site, ReferenceSite::Sublayer(0));
    assert_eq!(refs[2].site.to_string(), "/World{quality=high}.payloads[0]");
    assert_eq!(refs[3].site.to_string(), "/World/Floor.diffuse");
}

#[test]
fn test_flatten_then_references_only_selected() {
    let mut layer = Layer::new("/s/scene.sda", LayerFormat::Text, scene());
    assert_eq!(layer.flatten_variants(), 1);
    let refs = layer.references();
    assert!(refs.iter().all(|r| match &r.site {
        ReferenceSite::Prim { path, .. } => !path.is_inside_variant(),
        ReferenceSite::Sublayer(_) => true,
    }));
    assert!(refs.iter().any(|r| r.path == "hires.sdc"));
    assert!(layer.data.body(&PrimPath::root("World")).is_some());
}

#[test]
fn test_parsed_site_path_addresses_body() {
    let mut data = scene();
    let path: PrimPath = "/World{quality=high}".parse().unwrap();
    let site = data
        .references()
        .into_iter()
        .find(|r| r.kind == ReferenceKind::Payload)
        .map(|r| r.site)
        .unwrap();
    assert!(matches!(&site, ReferenceSite::Prim { path: p, .. } if *p == path));

    data.set_reference_path(&site, "lod/hires.sdc").unwrap();
    assert_eq!(data.body(&path).unwrap().payloads[0].asset_path, "lod/hires.sdc");
    assert!("World".parse::<PrimPath>().is_err());
}

#[test]
fn test_twin_prims_never_open() {
    let twins = LayerData::default()
        .with_prim(Prim::new("W").with_attribute("diffuse", AttrValue::Asset("foo/a.png".into())))
        .with_prim(Prim::new("W").with_attribute("diffuse", AttrValue::Asset("bar/b.png".into())));
    // Encoding does not check; reading back does.
    let resolver = MemoryResolver::new()
        .with_file("/s/twins.sda", encode(&twins, LayerFormat::Text).unwrap())
        .with_file("/s/twins.sdc", encode(&twins, LayerFormat::Binary).unwrap());
    let registry = LayerRegistry::new();
    for id in ["/s/twins.sda", "/s/twins.sdc"] {
        assert!(matches!(
            registry.open(&AssetId::new(id), &resolver),
            Err(LayerError::DuplicatePrim(path)) if path == "/W"
        ));
    }
}
