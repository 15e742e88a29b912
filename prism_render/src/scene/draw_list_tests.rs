use super::*;

fn item(mesh: u32, material: u32) -> DrawItem {
    DrawItem::new(MeshHandle(mesh), MaterialHandle(material), TransformHandle(mesh))
}

// ============================================================================
// FrameDrawLists
// ============================================================================

#[test]
fn test_lists_are_partitioned_by_class() {
    let mut lists = FrameDrawLists::new();
    lists.push(MaterialClass::Opaque, item(0, 0));
    lists.push(MaterialClass::Opaque, item(1, 0));
    lists.push(MaterialClass::Transparent, item(2, 1));
    lists.push(MaterialClass::Ui, item(3, 2));

    assert_eq!(lists.draw_list(MaterialClass::Opaque).len(), 2);
    assert!(lists.draw_list(MaterialClass::AlphaMasked).is_empty());
    assert_eq!(lists.draw_list(MaterialClass::Transparent), &[item(2, 1)]);
    assert_eq!(lists.draw_count(), 4);
}

#[test]
fn test_clear_empties_every_class() {
    let mut lists = FrameDrawLists::new();
    lists.push(MaterialClass::AlphaMasked, item(0, 0));
    lists.push(MaterialClass::Ui, item(1, 0));
    lists.clear();

    assert!(lists.is_empty());
}

#[test]
fn test_sort_keeps_transparent_order() {
    let mut lists = FrameDrawLists::new();
    lists.push(MaterialClass::Opaque, item(5, 2));
    lists.push(MaterialClass::Opaque, item(1, 0));
    lists.push(MaterialClass::Opaque, item(3, 2));
    lists.push(MaterialClass::Transparent, item(9, 3));
    lists.push(MaterialClass::Transparent, item(8, 1));

    lists.sort_by_material();

    let opaque: Vec<_> = lists.draw_list(MaterialClass::Opaque).iter().map(|i| i.mesh.0).collect();
    assert_eq!(opaque, vec![1, 3, 5]);
    let transparent: Vec<_> = lists.draw_list(MaterialClass::Transparent).iter().map(|i| i.mesh.0).collect();
    assert_eq!(transparent, vec![9, 8]);
}

#[test]
fn test_draw_item_defaults_to_one_instance() {
    assert_eq!(item(0, 0).instance_count, 1);
}
