mod common;

use common::{JsonSerializer, MAX_INDENT, SIMPLE_ATTRS, STRICT, isolated_cache, serializer};
use ctxcache::context::{CONTEXT_LOCALE, Context};

#[test]
fn map_groups_relevant_properties_by_namespace() {
    let cache = isolated_cache();
    let context = serializer(&cache)
        .set(SIMPLE_ATTRS, true)
        .set(MAX_INDENT, 2)
        .set(STRICT, true)
        .set(CONTEXT_LOCALE, "fr-FR")
        .build()
        .expect("build serializer");

    let map = context.as_map();
    let properties = serde_json::to_string_pretty(&map.properties).expect("serializable map");

    insta::assert_snapshot!(properties, @r#"
    {
      "Context": {
        "locale": "fr-FR"
      },
      "JsonSerializer": {
        "simpleAttrs": true
      },
      "WriterSerializer": {
        "maxIndent": 2
      }
    }
    "#);
}

#[test]
fn map_carries_type_and_cache_fingerprint() {
    let cache = isolated_cache();
    let context = serializer(&cache)
        .set(SIMPLE_ATTRS, true)
        .build()
        .expect("build serializer");

    let map = context.as_map();
    let expected = context
        .property_store()
        .fingerprint(&cache.namespaces_for::<JsonSerializer>())
        .to_string();

    assert_eq!(map.type_name, "JsonSerializer");
    assert_eq!(map.fingerprint, expected);
    assert_eq!(map.fingerprint.len(), 16);

    let rendered = map.to_string();
    assert!(rendered.contains("\"type\": \"JsonSerializer\""));
    assert_eq!(map.to_json()["properties"]["JsonSerializer"]["simpleAttrs"], true);
}

#[test]
fn irrelevant_properties_stay_out_of_the_map() {
    let cache = isolated_cache();
    let context = serializer(&cache)
        .set(STRICT, true)
        .build()
        .expect("build serializer");

    assert!(context.as_map().properties.is_empty());
    assert!(context.property_store().contains(STRICT));
}
