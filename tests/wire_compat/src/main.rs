fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use sbg_protocol::{
        DownloadInfo, ErrorInfo, File, Member, MultipartUpload, PageEnvelope, PartGrant,
        PartReport, Project, UploadInitRequest, UploadInitResponse, User,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn decode<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values. Only for types whose every field is present in the fixture.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
    }

    // --- Upload session ---

    #[test]
    fn fixture_upload_init_request() {
        roundtrip_test::<UploadInitRequest>("upload_init_request.json");
    }

    #[test]
    fn fixture_upload_init_response() {
        roundtrip_test::<UploadInitResponse>("upload_init_response.json");
        let resp: UploadInitResponse = decode("upload_init_response.json");
        assert_eq!(resp.part_size, 5_242_880);
        assert!(resp.parallel_uploads);
    }

    #[test]
    fn fixture_part_grant() {
        let grant: PartGrant = decode("part_grant.json");
        assert_eq!(grant.method, "PUT");
        assert_eq!(
            grant.expires,
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 12, 30, 0).unwrap())
        );
        assert!(grant.is_success(201));
        assert!(!grant.is_success(204));
        assert_eq!(
            grant.header_pairs(),
            vec![
                ("Content-Length".to_string(), "5242880".to_string()),
                ("x-amz-server-side-encryption".to_string(), "AES256".to_string()),
            ]
        );
        assert!(grant.report.is_some());
    }

    #[test]
    fn fixture_part_report() {
        roundtrip_test::<PartReport>("part_report.json");
        let report: PartReport = decode("part_report.json");
        assert_eq!(report, PartReport::new(2, "\"9b2cf535f27731c974343645a3985328\""));
    }

    #[test]
    fn fixture_multipart_uploads_page() {
        let page: PageEnvelope<MultipartUpload> = decode("multipart_uploads.json");
        assert!(page.links.is_empty());
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].project, "rfranklin/demo");
    }

    // --- Download ---

    #[test]
    fn fixture_download_info() {
        roundtrip_test::<DownloadInfo>("download_info.json");
    }

    // --- Errors ---

    #[test]
    fn fixture_error_envelope() {
        roundtrip_test::<ErrorInfo>("error_envelope.json");
        let info: ErrorInfo = decode("error_envelope.json");
        assert_eq!(info.status, 404);
        assert_eq!(info.code, 5002);
        assert!(!info.is_empty());
    }

    // --- Resources ---

    #[test]
    fn fixture_user() {
        roundtrip_test::<User>("user.json");
    }

    #[test]
    fn fixture_project() {
        roundtrip_test::<Project>("project.json");
    }

    #[test]
    fn fixture_member() {
        roundtrip_test::<Member>("member.json");
        let member: Member = decode("member.json");
        let perms = member.permissions.unwrap();
        assert!(perms.copy);
        assert!(!perms.admin);
    }

    #[test]
    fn fixture_file_mixed_timestamps() {
        let file: File = decode("file.json");
        let expected = Utc.with_ymd_and_hms(2026, 10, 1, 9, 15, 42).unwrap();
        assert_eq!(file.created_on, Some(expected));
        assert_eq!(file.modified_on, Some(expected));
        assert_eq!(file.size, 15_728_640);
        assert_eq!(file.metadata["sample_id"], "S1");
    }

    #[test]
    fn fixture_project_page() {
        let page: PageEnvelope<Project> = decode("project_page.json");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].rel, "next");
        assert_eq!(page.links[0].offset(), 2);
        assert_eq!(page.links[0].limit(), 2);
    }
}
