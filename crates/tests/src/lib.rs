//! # Integration Tests
//!
//! Cross-crate tests running the whole acquisition stack against the mock
//! driver.
//!
//! Covers:
//! - Contract snapshots (config and wire names)
//! - Mock e2e: config file -> session -> synchronized buffers -> legacy canvas
//! - Failure injection and teardown ordering

#[cfg(test)]
mod support {
    use contracts::{MockDriverConfig, SessionConfig};
    use device::MockDriver;
    use session::Session;

    /// Kinect v2 depth geometry with a reduced color frame
    pub fn kinect_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.mock = MockDriverConfig {
            fps: 120,
            color_width: 640,
            color_height: 360,
            ..Default::default()
        };
        config.capture.timeout_ms = 2_000;
        config.capture.probe_timeout_ms = 2_000;
        config
    }

    pub fn session(config: SessionConfig) -> Session<MockDriver> {
        Session::new(MockDriver::with_config(config.mock.clone()), config)
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{BackendKind, LegacyGeometry, SensorGeometry, SessionConfig, StreamKind};

    #[test]
    fn test_session_config_sections() {
        let json = serde_json::to_value(SessionConfig::default()).unwrap();
        for section in ["version", "device", "pipeline", "depth", "capture", "mock"] {
            assert!(json.get(section).is_some(), "missing section {section}");
        }
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["pipeline"]["backend"], "cpu");
        assert_eq!(json["capture"]["timeout_ms"], 10_000);
    }

    #[test]
    fn test_backend_names() {
        let names: Vec<String> = BackendKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            ["cpu", "opengl", "opencl", "opencl_kde", "cuda", "cuda_kde"]
        );
        for kind in BackendKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_native_geometry_fits_legacy_canvas() {
        let native = SensorGeometry::KINECT_V2;
        let legacy = LegacyGeometry::KINECT_V1;
        assert!(legacy.fits(native.depth.width, native.depth.height));
        assert_eq!(legacy.canvas_index(0, 0), 28 * 640 + 64);
        assert_eq!(StreamKind::ALL.len(), 3);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;

    use config_loader::ConfigLoader;
    use contracts::{
        BufferKind, ColorParams, IrParams, Registration, StreamFrame, StreamKind,
    };
    use device::{color_pattern, depth_pattern, DeviceEvent};
    use observability::CaptureStatsAggregator;
    use registration::SoftwareRegistration;
    use remap::LegacyFrame;
    use session::{SessionState, ShutdownToken};

    use crate::support::{kinect_config, session};

    /// End-to-end: TOML file -> ConfigLoader -> Session -> capture loop
    #[test]
    fn test_e2e_config_file_to_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kinect.toml");
        fs::write(
            &path,
            r#"
[pipeline]
backend = "opengl"

[capture]
timeout_ms = 2000
probe_timeout_ms = 2000

[mock]
fps = 120
color_width = 640
color_height = 360
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        let mut session = session(config);
        session.configure().unwrap();
        session.start().unwrap();

        let geometry = *session.geometry().unwrap();
        assert_eq!((geometry.depth.width, geometry.depth.height), (512, 424));
        assert_eq!((geometry.registered.width, geometry.registered.height), (512, 424));
        for kind in [
            BufferKind::Rgb,
            BufferKind::Ir,
            BufferKind::Registered,
            BufferKind::Undistorted,
        ] {
            assert_eq!(
                session.buffers().bytes(kind).len(),
                geometry.stream(kind).byte_len(),
                "buffer {kind}"
            );
        }

        let mut previous = None;
        let stats = session
            .run(&ShutdownToken::new(), Some(10), |report, buffers| {
                let ts = report.timestamps;
                assert_eq!(buffers.timestamps(), ts);
                // all three streams of one bundle share the device tick
                assert_eq!(ts.color, ts.depth);
                assert_eq!(ts.infrared, ts.depth);
                if let Some(prev) = previous {
                    assert!(ts.depth > prev, "timestamps must increase");
                }
                previous = Some(ts.depth);
            })
            .unwrap();
        assert_eq!(stats.frames, 10);

        let depth = session.buffers().depth();
        let expected = depth_pattern(512, 424);
        // corners fall below the default 0.3 m minimum and are zeroed by the pipeline
        assert_eq!(depth[0], 0.0);
        assert_eq!(depth[512 * 212 + 256], expected[512 * 212 + 256]);

        let undistorted = session.buffers().undistorted_samples();
        assert!(undistorted
            .iter()
            .all(|&d| d == 0.0 || (1000.0..=2600.0).contains(&d)));
        assert!(undistorted.iter().any(|&d| d > 0.0));
        assert!(session.buffers().registered().iter().any(|&b| b != 0));

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.sync_stats().bundles_captured, 10);
    }

    #[test]
    fn test_e2e_legacy_remap() {
        let mut config = kinect_config();
        config.capture.legacy_remap = true;
        let mut session = session(config);
        session.configure().unwrap();
        session.start().unwrap();
        session.capture_frame().unwrap();

        let buffers = session.buffers();
        let mut canvas = LegacyFrame::default();
        canvas
            .remap_from(buffers.depth(), buffers.registered(), 512, 424)
            .unwrap();

        let legacy = *canvas.geometry();
        let src = 512 * 100 + 200;
        let dst = legacy.canvas_index(200, 100);
        assert_eq!(canvas.depth()[dst], buffers.depth()[src]);
        assert_eq!(
            &canvas.color()[dst * 4..dst * 4 + 4],
            &buffers.registered()[src * 4..src * 4 + 4]
        );

        // outside the mapped region stays untouched
        assert_eq!(canvas.depth()[legacy.canvas_index(0, 0) - 1], 0.0);
        assert!(canvas.depth()[..28 * 640].iter().all(|&d| d == 0.0));
        session.stop().unwrap();
    }

    #[test]
    fn test_e2e_mirrored_depth() {
        let mut plain = session(kinect_config());
        plain.configure().unwrap();
        plain.start().unwrap();
        plain.capture_frame().unwrap();
        let plain_depth = plain.buffers().depth().to_vec();
        plain.stop().unwrap();

        let mut config = kinect_config();
        config.capture.mirror_depth = true;
        let mut mirrored = session(config);
        mirrored.configure().unwrap();
        mirrored.start().unwrap();
        mirrored.capture_frame().unwrap();
        assert_ne!(mirrored.buffers().depth(), plain_depth.as_slice());

        for (a, b) in plain_depth
            .chunks_exact(512)
            .zip(mirrored.buffers().depth().chunks_exact(512))
        {
            let reversed: Vec<f32> = a.iter().rev().copied().collect();
            assert_eq!(reversed, b);
        }
        mirrored.stop().unwrap();
    }

    #[test]
    fn test_e2e_selftest_thirty_frames() {
        let mut session = session(kinect_config());
        let report = session.selftest(30).unwrap();

        assert_eq!(report.timestamps.len(), 30);
        assert!(report
            .timestamps
            .windows(2)
            .all(|pair| pair[1].not_before(&pair[0])));
        assert_eq!(report.geometry.color.width, 640);
        assert_eq!(report.backend.to_string(), "cpu");
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_e2e_teardown_order() {
        let mut session = session(kinect_config());
        let events = session.driver().events();
        session.configure().unwrap();
        session.start().unwrap();
        session.capture_frame().unwrap();
        session.stop().unwrap();

        let serial = session.serial_number().unwrap().to_string();
        assert_eq!(
            events.snapshot(),
            vec![
                DeviceEvent::Opened { serial: serial.clone() },
                DeviceEvent::ListenerAttached { serial: serial.clone() },
                DeviceEvent::ListenerAttached { serial: serial.clone() },
                DeviceEvent::Started { serial: serial.clone() },
                DeviceEvent::Stopped { serial: serial.clone() },
                DeviceEvent::Closed { serial },
            ]
        );
    }

    #[test]
    fn test_e2e_capture_statistics() {
        let mut session = session(kinect_config());
        session.configure().unwrap();
        session.start().unwrap();

        let mut aggregator = CaptureStatsAggregator::new();
        let stats = session
            .run(&ShutdownToken::new(), Some(6), |report, _| {
                aggregator.record_frame(&report.timestamps, report.latency);
            })
            .unwrap();
        session.stop().unwrap();

        let summary = aggregator.summary(stats.elapsed);
        assert_eq!(summary.total_frames, 6);
        assert_eq!(summary.regressions, 0);
        // 120 fps = 83 ticks per frame; bundles may be skipped, never reordered
        let interval = &summary.interval_ms[&StreamKind::Depth];
        assert_eq!(interval.count, 5);
        assert!(interval.min >= 8.3 - 1e-9);
    }

    #[test]
    fn test_software_registration_on_mock_frames() {
        let frame = |kind, width, height, data: Vec<u8>| StreamFrame {
            kind,
            width,
            height,
            bytes_per_pixel: 4,
            timestamp: 1,
            sequence: 1,
            data: data.into(),
        };
        let depth: Vec<u8> = depth_pattern(512, 424)
            .iter()
            .flat_map(|d| d.to_le_bytes())
            .collect();
        let color = frame(StreamKind::Color, 640, 360, color_pattern(640, 360));
        let depth = frame(StreamKind::Depth, 512, 424, depth);

        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let view = registration.apply(&color, &depth).unwrap();
        assert_eq!((view.registered.width, view.registered.height), (512, 424));
        assert_eq!(view.undistorted.data.len(), 512 * 424 * 4);
    }
}

#[cfg(test)]
mod failure_tests {
    use contracts::{BackendKind, ContractError, StreamKind};
    use device::DeviceEvent;
    use session::{SessionError, SessionState};

    use crate::support::{kinect_config, session};

    #[test]
    fn test_no_device_connected() {
        let mut config = kinect_config();
        config.mock.device_count = 0;
        let mut session = session(config);

        let err = session.configure().unwrap_err();
        assert!(matches!(err, SessionError::Contract(ContractError::NoDeviceFound)));
        assert_eq!(err.to_string(), "no device connected");
        session.stop().unwrap();
    }

    #[test]
    fn test_unavailable_pipeline_lists_alternatives() {
        let mut config = kinect_config();
        config.pipeline.backend = BackendKind::CudaKde;
        let mut session = session(config);

        match session.configure() {
            Err(SessionError::Contract(ContractError::BackendUnavailable { requested, available })) => {
                assert_eq!(requested, "cuda_kde");
                assert_eq!(available, vec!["cpu".to_string(), "opengl".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_silent_device_times_out_and_tears_down() {
        let mut config = kinect_config();
        config.mock.silent = true;
        config.capture.probe_timeout_ms = 30;
        let mut session = session(config);
        let events = session.driver().events();

        session.configure().unwrap();
        let err = session.start().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.missing_streams(), &StreamKind::ALL[..]);
        assert_eq!(session.state(), SessionState::Configured);

        session.stop().unwrap();
        let closes = events.count(|e| matches!(e, DeviceEvent::Closed { .. }));
        assert_eq!(closes, 1);
        assert!(matches!(
            session.capture_frame(),
            Err(SessionError::UseAfterStop { .. })
        ));
    }

    #[test]
    fn test_drop_closes_device() {
        let events = {
            let mut session = session(kinect_config());
            let events = session.driver().events();
            session.configure().unwrap();
            session.start().unwrap();
            events
        };
        assert!(matches!(events.snapshot().last(), Some(DeviceEvent::Closed { .. })));
    }
}
