use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use rodovia_harvester::accidents;
use rodovia_harvester::config::HarvestConfig;
use rodovia_harvester::error::HarvestError;
use rodovia_harvester::fetch::Fetch;
use rodovia_harvester::geometry;
use rodovia_harvester::render::{PageRenderer, ScrollPlan};
use rodovia_harvester::robots::PermissionGate;
use rodovia_harvester::throttle::NoThrottle;
use rodovia_harvester::weather;
use rodovia_harvester::workspace::Workspace;

struct FixtureRenderer {
    html: &'static str,
}

impl PageRenderer for FixtureRenderer {
    fn render(&self, _url: &str) -> Result<String, HarvestError> {
        Ok(self.html.to_string())
    }

    fn render_scrolled(&self, _url: &str, _plan: &ScrollPlan) -> Result<String, HarvestError> {
        Ok(self.html.to_string())
    }
}

struct AllowAll;

impl PermissionGate for AllowAll {
    fn can_fetch(&self, _url: &str, _robots_url: &str) -> Result<bool, HarvestError> {
        Ok(true)
    }
}

struct DenyAll;

impl PermissionGate for DenyAll {
    fn can_fetch(&self, _url: &str, _robots_url: &str) -> Result<bool, HarvestError> {
        Ok(false)
    }
}

struct DenyMatching {
    needle: &'static str,
}

impl PermissionGate for DenyMatching {
    fn can_fetch(&self, url: &str, _robots_url: &str) -> Result<bool, HarvestError> {
        Ok(!url.contains(self.needle))
    }
}

#[derive(Default)]
struct MockFetch {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    failing: Vec<String>,
    requests: Mutex<Vec<String>>,
}

impl Fetch for MockFetch {
    fn fetch_page(&self, url: &str) -> Result<String, HarvestError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| HarvestError::HttpStatus {
                status: 404,
                message: format!("no page for {url}"),
            })
    }

    fn download(&self, url: &str, destination: &std::path::Path) -> Result<u64, HarvestError> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.failing.iter().any(|failing| failing == url) {
            return Err(HarvestError::HttpStatus {
                status: 500,
                message: "internal server error".to_string(),
            });
        }
        let bytes = self
            .files
            .get(url)
            .cloned()
            .unwrap_or_else(|| b"payload".to_vec());
        std::fs::write(destination, &bytes)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(bytes.len() as u64)
    }
}

fn workspace(temp: &TempDir) -> Workspace {
    Workspace::with_root(Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap())
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const ACCIDENT_LISTING: &str = r##"
<section id="dataset-resources">
  <ul class="resource-list">
    <li class="resource-item">
      <a class="heading" title="Acidentes 2019">x</a>
      <a class="resource-url-analytics" href="https://dados.antt.gov.br/ds/acidentes2019.csv">Baixar</a>
    </li>
    <li class="resource-item">
      <a class="heading" title="Acidentes 2020">x</a>
      <a class="resource-url-analytics" href="https://dados.antt.gov.br/ds/acidentes2020.csv">Baixar</a>
    </li>
    <li class="resource-item">
      <a class="heading" title="Acidentes 2021">x</a>
      <a class="resource-url-analytics" href="https://dados.antt.gov.br/ds/acidentes2021.csv">Baixar</a>
    </li>
    <li class="resource-item">
      <a class="heading" title="Acidentes 2022">x</a>
      <a class="resource-url-analytics" href="https://dados.antt.gov.br/ds/acidentes2022.csv">Baixar</a>
    </li>
    <li class="resource-item">
      <a class="heading" title="Acidentes 2023">x</a>
      <a class="resource-url-analytics" href="https://dados.antt.gov.br/ds/acidentes2023.csv">Baixar</a>
    </li>
  </ul>
</section>
"##;

#[test]
fn accident_batch_isolates_item_failures() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let renderer = FixtureRenderer {
        html: ACCIDENT_LISTING,
    };
    let fetcher = MockFetch {
        failing: vec!["https://dados.antt.gov.br/ds/acidentes2021.csv".to_string()],
        ..MockFetch::default()
    };

    let report =
        accidents::run(&config, &ws, &renderer, &AllowAll, &fetcher, &NoThrottle).unwrap();

    assert_eq!(report.links, 5);
    assert_eq!(report.downloaded, 4);
    assert_eq!(report.errors, 1);
    assert!(ws.accidents_dir().join("acidentes2019.csv").as_std_path().exists());
    assert!(ws.accidents_dir().join("acidentes2023.csv").as_std_path().exists());
    assert!(!ws.accidents_dir().join("acidentes2021.csv").as_std_path().exists());
    assert!(ws.accidents_snapshot().as_std_path().exists());
}

#[test]
fn accident_pipeline_stops_when_listing_is_denied() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let renderer = FixtureRenderer {
        html: ACCIDENT_LISTING,
    };
    let fetcher = MockFetch::default();

    let err =
        accidents::run(&config, &ws, &renderer, &DenyAll, &fetcher, &NoThrottle).unwrap_err();

    assert_matches!(err, HarvestError::PermissionDenied(_));
    assert!(!ws.accidents_snapshot().as_std_path().exists());
}

#[test]
fn accident_pipeline_aborts_on_denied_download() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let renderer = FixtureRenderer {
        html: ACCIDENT_LISTING,
    };
    let fetcher = MockFetch::default();
    let gate = DenyMatching {
        needle: "acidentes2020.csv",
    };

    let err = accidents::run(&config, &ws, &renderer, &gate, &fetcher, &NoThrottle).unwrap_err();

    assert_matches!(err, HarvestError::PermissionDenied(_));
}

const SHARE_LISTING: &str = r#"
<table>
  <tr data-type="file" data-file="202301A.zip">
    <td class="filename"><a class="name" href="/dnitcloud/index.php/s/oTpPRmYs5AAdiNr?path=%2FSNV%20Bases%20(SHP)">a</a></td>
    <td class="filesize">120 MB</td>
    <td><span class="modified">há um ano</span></td>
  </tr>
  <tr data-type="file" data-file="202310B.zip">
    <td class="filename"><a class="name" href="/dnitcloud/index.php/s/oTpPRmYs5AAdiNr?path=%2FSNV%20Bases%20(SHP)">b</a></td>
    <td class="filesize">131 MB</td>
    <td><span class="modified">há 3 meses</span></td>
  </tr>
</table>
"#;

#[test]
fn geometry_pipeline_downloads_the_latest_archive() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let renderer = FixtureRenderer {
        html: SHARE_LISTING,
    };
    let fetcher = MockFetch::default();

    let report =
        geometry::run(&config, &ws, &renderer, &AllowAll, &fetcher, &NoThrottle).unwrap();

    assert_eq!(report.files_seen, 2);
    assert_eq!(report.latest, "202310B.zip");
    assert_eq!(
        report.download_url,
        "https://servicos.dnit.gov.br/dnitcloud/index.php/s/oTpPRmYs5AAdiNr?path=/SNV%20Bases%20%28SHP%29/202310B.zip"
    );
    let requests = fetcher.requests.lock().unwrap();
    assert_eq!(requests.as_slice(), [report.download_url.clone()]);
    assert!(ws.geometry_dir().join("202310B.zip").as_std_path().exists());
    assert!(ws.geometry_snapshot().as_std_path().exists());
}

const WEATHER_LISTING: &str = r#"
<article class="post-preview">
  <a href="/uploads/dadoshistoricos/2019.zip">ANO 2019 (AUTOMÁTICA)</a>
</article>
<article class="post-preview">
  <a href="/uploads/dadoshistoricos/2020.zip">ANO 2020 (AUTOMÁTICA)</a>
</article>
"#;

fn weather_fetcher(zip_2019: Vec<u8>, zip_2020: Vec<u8>) -> MockFetch {
    let mut pages = HashMap::new();
    pages.insert(
        "https://portal.inmet.gov.br/dadoshistoricos".to_string(),
        WEATHER_LISTING.to_string(),
    );
    let mut files = HashMap::new();
    files.insert(
        "https://portal.inmet.gov.br/uploads/dadoshistoricos/2019.zip".to_string(),
        zip_2019,
    );
    files.insert(
        "https://portal.inmet.gov.br/uploads/dadoshistoricos/2020.zip".to_string(),
        zip_2020,
    );
    MockFetch {
        pages,
        files,
        ..MockFetch::default()
    }
}

#[test]
fn weather_pipeline_extracts_and_buckets_by_year() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let fetcher = weather_fetcher(
        zip_bytes(&[("estacao_A001_2019.csv", b"a;b".as_slice())]),
        zip_bytes(&[
            ("estacao_A002_2020.csv", b"c;d".as_slice()),
            ("leia-me.txt", b"notas".as_slice()),
        ]),
    );

    let report = weather::run(&config, &ws, &AllowAll, &fetcher, &NoThrottle).unwrap();

    assert_eq!(report.years, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(report.organize.moved, 2);

    let dir = ws.weather_dir();
    assert!(dir.join("2019/estacao_A001_2019.csv").as_std_path().exists());
    assert!(dir.join("2020/estacao_A002_2020.csv").as_std_path().exists());
    assert!(dir.join("leia-me.txt").as_std_path().exists());
    assert!(!dir.join("2019.zip").as_std_path().exists());
    assert!(!dir.join("2020.zip").as_std_path().exists());
}

#[test]
fn weather_pipeline_isolates_a_corrupt_archive() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let fetcher = weather_fetcher(
        b"not a zip archive".to_vec(),
        zip_bytes(&[("estacao_A002_2020.csv", b"c;d".as_slice())]),
    );

    let report = weather::run(&config, &ws, &AllowAll, &fetcher, &NoThrottle).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.errors, 1);
    assert!(
        ws.weather_dir()
            .join("2020/estacao_A002_2020.csv")
            .as_std_path()
            .exists()
    );
}

#[test]
fn weather_pipeline_skips_a_denied_year_and_continues() {
    let temp = tempfile::tempdir().unwrap();
    let ws = workspace(&temp);
    let config = HarvestConfig::default();
    let fetcher = weather_fetcher(
        zip_bytes(&[("estacao_A001_2019.csv", b"a;b".as_slice())]),
        zip_bytes(&[("estacao_A002_2020.csv", b"c;d".as_slice())]),
    );
    let gate = DenyMatching {
        needle: "2019.zip",
    };

    let report = weather::run(&config, &ws, &gate, &fetcher, &NoThrottle).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.errors, 1);
    let requests = fetcher.requests.lock().unwrap();
    assert_eq!(
        requests.as_slice(),
        ["https://portal.inmet.gov.br/uploads/dadoshistoricos/2020.zip"]
    );
}
