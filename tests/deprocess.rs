use approx::assert_abs_diff_eq;
use ldm_utils::tensor::{Tensor, Value};
use ldm_utils::transforms::{
    deprocess_and_save, fast_imagenet_deprocess_batch, fast_mel_deprocess_batch,
    imagenet_deprocess, imagenet_deprocess_batch, imagenet_preprocess, rescale, window_segment,
    NormalizeMethod, Transform, TransformError, IMAGENET_MEAN, IMAGENET_STD, VOX_MEL_MEAN,
    VOX_MEL_STD,
};
use ndarray::{Array, Array2, Array3, ArrayD, Axis, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_batch(rng: &mut StdRng, shape: &[usize], lo: f32, hi: f32) -> ArrayD<f32> {
    Array::from_shape_simple_fn(IxDyn(shape), || rng.gen_range(lo..hi))
}

#[test]
fn fast_and_loop_deprocess_agree_without_rescale() {
    let mut rng = StdRng::seed_from_u64(7);
    let imgs = random_batch(&mut rng, &[3, 3, 8, 8], -2.0, 2.0);

    let untracked = Tensor::new(imgs.clone(), false);
    let fast = fast_imagenet_deprocess_batch(&untracked, NormalizeMethod::Imagenet)
        .unwrap()
        .data_clone()
        .unwrap();
    let looped = imagenet_deprocess_batch(imgs, false, NormalizeMethod::Imagenet).unwrap();

    assert_eq!(fast.shape(), looped.shape());
    for (f, l) in fast.iter().zip(looped.iter()) {
        assert!((0.0..=255.0).contains(f));
        assert!((f - *l as f32).abs() <= 1.0, "fast {f} vs loop {l}");
    }
}

#[test]
fn fast_deprocess_matches_the_affine_formula() {
    let imgs = ArrayD::zeros(IxDyn(&[2, 3, 2, 2]));
    let out = fast_imagenet_deprocess_batch(&Tensor::new(imgs, false), NormalizeMethod::Imagenet)
        .unwrap()
        .data_clone()
        .unwrap();
    for (c, channel) in out.axis_iter(Axis(1)).enumerate() {
        for &v in channel.iter() {
            assert_abs_diff_eq!(v, IMAGENET_MEAN[c] * 255.0, epsilon = 1e-3);
        }
    }
}

#[test]
fn fast_deprocess_propagates_gradients() {
    let imgs = Tensor::new(ArrayD::zeros(IxDyn(&[2, 3, 4, 4])), true);
    let out = fast_imagenet_deprocess_batch(&imgs, NormalizeMethod::Imagenet).unwrap();
    out.backward_with(ArrayD::ones(IxDyn(out.shape()))).unwrap();

    let grad = imgs.grad().unwrap().expect("input gradient");
    for (c, channel) in grad.axis_iter(Axis(1)).enumerate() {
        for &g in channel.iter() {
            assert_abs_diff_eq!(g, 255.0 * IMAGENET_STD[c], epsilon = 1e-3);
        }
    }
}

#[test]
fn fast_deprocess_clamps_and_blocks_saturated_gradients() {
    let imgs = Tensor::new(ArrayD::from_elem(IxDyn(&[1, 3, 1, 1]), 10.0), true);
    let out = fast_imagenet_deprocess_batch(&imgs, NormalizeMethod::Standard).unwrap();
    assert!(out.data().unwrap().iter().all(|&v| v == 255.0));

    out.backward_with(ArrayD::ones(IxDyn(out.shape()))).unwrap();
    assert!(imgs.grad().unwrap().unwrap().iter().all(|&g| g == 0.0));
}

#[test]
fn fast_deprocess_requires_a_four_dimensional_batch() {
    let imgs = Tensor::new(ArrayD::zeros(IxDyn(&[3, 4, 4])), false);
    assert!(matches!(
        fast_imagenet_deprocess_batch(&imgs, NormalizeMethod::Imagenet),
        Err(TransformError::Shape(_))
    ));
}

#[test]
fn fast_mel_deprocess_is_affine_and_differentiable() {
    let log_mels = Tensor::new(ArrayD::from_elem(IxDyn(&[2, 80, 16]), 1.0), true);
    let out = fast_mel_deprocess_batch(&log_mels, NormalizeMethod::VoxMel).unwrap();
    for &v in out.data().unwrap().iter() {
        assert_abs_diff_eq!(v, VOX_MEL_STD[0] + VOX_MEL_MEAN[0], epsilon = 1e-4);
    }

    out.backward_with(ArrayD::ones(IxDyn(out.shape()))).unwrap();
    for &g in log_mels.grad().unwrap().unwrap().iter() {
        assert_abs_diff_eq!(g, VOX_MEL_STD[0], epsilon = 1e-6);
    }
}

#[test]
fn loop_deprocess_accepts_tracked_and_raw_values() {
    let mut rng = StdRng::seed_from_u64(11);
    let imgs = random_batch(&mut rng, &[2, 3, 5, 5], -1.0, 1.0);
    let tracked = Tensor::new(imgs.clone(), true);

    let method = NormalizeMethod::Standard;
    let from_raw = imagenet_deprocess_batch(Value::Raw(imgs), true, method).unwrap();
    let from_tracked = imagenet_deprocess_batch(&tracked, true, method).unwrap();
    assert_eq!(from_raw, from_tracked);
    assert!(tracked.grad().unwrap().is_none());
}

#[test]
fn loop_deprocess_rescales_each_sample_independently() {
    let mut imgs = ArrayD::zeros(IxDyn(&[2, 3, 4, 4]));
    imgs.index_axis_mut(Axis(0), 1).fill(0.1);
    imgs[[0, 0, 0, 0]] = 1.0;
    imgs[[1, 2, 3, 3]] = -1.0;

    let out = imagenet_deprocess_batch(imgs, true, NormalizeMethod::Imagenet).unwrap();
    assert_eq!(out.dim(), (2, 3, 4, 4));
    for sample in out.outer_iter() {
        assert_eq!(sample.iter().copied().min(), Some(0));
        assert!(sample.iter().copied().max().unwrap() >= 254);
    }
}

#[test]
fn empty_batch_yields_empty_output() {
    let imgs = ArrayD::<f32>::zeros(IxDyn(&[0, 3, 4, 4]));
    let out = imagenet_deprocess_batch(imgs, false, NormalizeMethod::Imagenet).unwrap();
    assert_eq!(out.dim(), (0, 3, 4, 4));
}

#[test]
fn preprocess_then_deprocess_is_identity_for_random_images() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..8 {
        let x = random_batch(&mut rng, &[3, 6, 6], 0.0, 1.0);
        let restored = imagenet_deprocess(false, NormalizeMethod::Imagenet)
            .apply(imagenet_preprocess(NormalizeMethod::Imagenet).apply(x.clone()).unwrap())
            .unwrap();
        for (a, b) in x.iter().zip(restored.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }
}

#[test]
fn rescale_output_lies_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..16 {
        let x = random_batch(&mut rng, &[4, 7], -50.0, 50.0);
        let y = rescale(x);
        assert!(y.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn window_segment_ten_frames_window_four_stride_two() {
    let log_mel = Array2::from_shape_fn((80, 10), |(f, t)| (f * 100 + t) as f32);
    let windows = window_segment(log_mel.view(), 4, 2).unwrap();
    assert_eq!(windows.dim(), (4, 80, 4));
    for (i, window) in windows.outer_iter().enumerate() {
        assert_eq!(window, log_mel.slice(ndarray::s![.., 2 * i..2 * i + 4]));
    }
}

#[test]
fn deprocess_and_save_writes_rgb_and_grayscale_files() {
    let dir = tempfile::tempdir().unwrap();
    let rgb = Array3::from_shape_fn((3, 6, 5), |(c, y, x)| (c + y + x) as f32 * 0.1 - 0.5);

    let jpg = dir.path().join("face.jpg");
    deprocess_and_save(rgb.view(), NormalizeMethod::Imagenet, &jpg).unwrap();
    let decoded = image::open(&jpg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (5, 6));

    let png = dir.path().join("face.png");
    deprocess_and_save(rgb.view(), NormalizeMethod::Standard, &png).unwrap();
    let decoded = image::open(&png).unwrap().to_rgb8();
    // Rescale maps the darkest pixel (0, 0) to 0 and the brightest to ~255.
    assert_eq!(decoded.get_pixel(0, 0).0[0], 0);
    assert!(decoded.get_pixel(4, 5).0[2] >= 254);

    let mel = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| (y * 4 + x) as f32);
    let gray = dir.path().join("mel.png");
    deprocess_and_save(mel.view(), NormalizeMethod::VoxMel, &gray).unwrap();
    assert_eq!(image::open(&gray).unwrap().to_luma8().dimensions(), (4, 4));
}

#[test]
fn deprocess_and_save_reports_bad_targets() {
    let dir = tempfile::tempdir().unwrap();
    let rgb = Array3::<f32>::zeros((3, 4, 4));

    let unknown = dir.path().join("image.unknownext");
    assert!(matches!(
        deprocess_and_save(rgb.view(), NormalizeMethod::Imagenet, &unknown),
        Err(TransformError::ImageSave { .. })
    ));

    let missing_dir = dir.path().join("nope").join("image.png");
    assert!(matches!(
        deprocess_and_save(rgb.view(), NormalizeMethod::Imagenet, &missing_dir),
        Err(TransformError::ImageSave { .. })
    ));

    let two_channel = Array3::<f32>::zeros((2, 4, 4));
    assert!(matches!(
        deprocess_and_save(two_channel.view(), NormalizeMethod::Imagenet, dir.path().join("x.png")),
        Err(TransformError::Shape(_))
    ));
}
