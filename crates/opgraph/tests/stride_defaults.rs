use opgraph::layout::{
    channels_last_stride_order, default_channels_last_strides, stride_for_order,
};

#[test]
fn stride_order_places_channels_innermost() {
    // [N, C, H, W]: positions counted from the innermost axis outward.
    let order = channels_last_stride_order(4);
    assert_eq!(order.as_slice(), &[3, 0, 2, 1]);
}

#[test]
fn default_strides_for_2d_shape() {
    let strides = default_channels_last_strides(&[4, 16]);
    assert_eq!(strides.as_slice(), &[16, 1]);
}

#[test]
fn default_strides_for_4d_shape() {
    // [8, 64, 32, 32] in memory order N, H, W, C.
    let strides = default_channels_last_strides(&[8, 64, 32, 32]);
    assert_eq!(strides.as_slice(), &[65536, 1, 2048, 64]);
}

#[test]
fn default_strides_for_5d_shape() {
    // [N, C, D, H, W] -> memory order N, D, H, W, C.
    let strides = default_channels_last_strides(&[2, 8, 4, 6, 5]);
    assert_eq!(strides.as_slice(), &[960, 1, 240, 40, 8]);
}

#[test]
fn stride_for_order_multiplies_inner_extents() {
    let order = channels_last_stride_order(4);
    let strides = stride_for_order(&[1, 64, 1, 1], &order);
    assert_eq!(strides.as_slice(), &[64, 1, 64, 64]);
}

#[test]
fn low_rank_shapes_degrade_to_packed_layout() {
    assert_eq!(default_channels_last_strides(&[7]).as_slice(), &[1]);
    assert!(default_channels_last_strides(&[]).is_empty());
}
