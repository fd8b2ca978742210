// Metric names for the upload pipeline (rolling, compression, upload).
// The agent registers descriptions at startup.

#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub description: &'static str,
}

pub const ROLLOVER_TOTAL: Metric = Metric {
    name: "logroll_rollover_total",
    description: "Total number of log file rollovers (reason={time,size,manual})",
};

pub const COMPRESSION_TOTAL: Metric = Metric {
    name: "logroll_compression_total",
    description: "Total number of rolled files compressed (mode, result={success,error,missing})",
};

pub const COMPRESSION_LATENCY_MS: Metric = Metric {
    name: "logroll_compression_latency_ms",
    description: "Latency to compress one rolled file (mode)",
};

pub const UPLOAD_OBJECTS_TOTAL: Metric = Metric {
    name: "logroll_upload_objects_total",
    description: "Total number of upload attempts (provider, result={success,error,skipped})",
};

pub const UPLOAD_BYTES_TOTAL: Metric = Metric {
    name: "logroll_upload_bytes_total",
    description: "Total bytes uploaded to the storage backend (provider)",
};

pub const UPLOAD_LATENCY_MS: Metric = Metric {
    name: "logroll_upload_latency_ms",
    description: "Latency to upload one rolled file (provider)",
};

pub const UPLOAD_DISCARDED_TOTAL: Metric = Metric {
    name: "logroll_upload_discarded_total",
    description: "Queued uploads discarded by a forced pool shutdown",
};

pub const COUNTERS: &[Metric] = &[
    ROLLOVER_TOTAL,
    COMPRESSION_TOTAL,
    UPLOAD_OBJECTS_TOTAL,
    UPLOAD_BYTES_TOTAL,
    UPLOAD_DISCARDED_TOTAL,
];

pub const HISTOGRAMS: &[Metric] = &[COMPRESSION_LATENCY_MS, UPLOAD_LATENCY_MS];
