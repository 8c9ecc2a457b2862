pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod math;
    pub mod model_resolver;
    pub mod session_config;
    pub mod session_error;
    pub mod video_metadata;
}

pub mod imaging {
    pub mod frame_ops;
    pub mod resize_policy;
    pub mod text_overlay;
}

pub mod detection {
    pub mod domain {
        pub mod face_analyser;
        pub mod face_descriptor;
    }
    pub mod infrastructure;
}

pub mod mapping {
    pub mod domain {
        pub mod face_map;
        pub mod face_matcher;
    }
    pub mod target_faces_use_case;
}

pub mod processing {
    pub mod domain {
        pub mod frame_processor;
        pub mod processor_chain;
    }
    pub mod infrastructure;
}

pub mod gating {
    pub mod domain {
        pub mod content_classifier;
        pub mod content_gate;
    }
}

pub mod video {
    pub mod domain {
        pub mod image_writer;
        pub mod video_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod image_file_reader;
        pub mod image_file_writer;
        pub mod reader_factory;
    }
}

pub mod capture {
    pub mod domain {
        pub mod camera;
        pub mod capture_state;
        pub mod fps_meter;
        pub mod renderer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_camera;
        pub mod image_file_renderer;
    }
}

pub mod pipeline {
    pub mod capture_session;
    pub mod pipeline_logger;
    pub mod scrub_session;
    pub mod infrastructure {
        pub mod capture_worker;
    }
}
