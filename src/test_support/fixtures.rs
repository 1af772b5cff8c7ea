//! Test fixtures for common conversion scenarios.
//!
//! A [`RepoFixture`] is a throwaway repository on disk; [`legacy_repo`]
//! builds the usual NuGet layout with a solution, two projects and the
//! `.nuget` helper folder.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A solution listing one project and the `.nuget` helper files.
pub const LEGACY_SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 2013
VisualStudioVersion = 12.0.31101.0
MinimumVisualStudioVersion = 10.0.40219.1
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{3F2A1C9B-6E2D-4B8A-9C1E-2D7F4A5B6C8D}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = ".nuget", ".nuget", "{A1B2C3D4-E5F6-4789-ABCD-EF0123456789}"
	ProjectSection(SolutionItems) = preProject
		.nuget\NuGet.exe = .nuget\NuGet.exe
		.nuget\NuGet.targets = .nuget\NuGet.targets
		.nuget\packages.config = .nuget\packages.config
	EndProjectSection
EndProject
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Debug|Any CPU = Debug|Any CPU
	EndGlobalSection
EndGlobal
"#;

/// A project wired to NuGet's restore targets.
pub const LEGACY_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="12.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <OutputType>Library</OutputType>
    <RestorePackages>true</RestorePackages>
  </PropertyGroup>
  <ItemGroup>
    <Compile Include="Class1.cs" />
    <None Include="packages.config" />
  </ItemGroup>
  <Import Project="$(MSBuildToolsPath)\Microsoft.CSharp.targets" />
  <Import Project="$(SolutionDir)\.nuget\NuGet.targets" Condition="Exists('$(SolutionDir)\.nuget\NuGet.targets')" />
  <Target Name="EnsureNuGetPackageBuildImports" BeforeTargets="PrepareForBuild">
    <Error Condition="!Exists('$(SolutionDir)\.nuget\NuGet.targets')" Text="Missing NuGet.targets" />
  </Target>
</Project>
"#;

/// Render a `packages.config` listing `packages` as (id, version) pairs.
pub fn packages_config(packages: &[(&str, &str)]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n");
    for (id, version) in packages {
        out.push_str(&format!(
            "  <package id=\"{}\" version=\"{}\" targetFramework=\"net45\" />\n",
            id, version
        ));
    }
    out.push_str("</packages>\n");
    out
}

/// Render a `NuGet.Config` declaring `sources` as (key, url) pairs.
pub fn nuget_config(sources: &[(&str, &str)]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n");
    out.push_str("  <packageSources>\n");
    for (key, url) in sources {
        out.push_str(&format!("    <add key=\"{}\" value=\"{}\" />\n", key, url));
    }
    out.push_str("  </packageSources>\n</configuration>\n");
    out
}

/// A temporary repository.
#[derive(Debug)]
pub struct RepoFixture {
    dir: TempDir,
}

impl RepoFixture {
    pub fn new() -> Self {
        RepoFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Add a file, creating parent directories.
    pub fn with_file(self, relative: &str, content: impl AsRef<[u8]>) -> Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative))
            .unwrap_or_else(|_| panic!("fixture file missing: {}", relative))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }
}

impl Default for RepoFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A solution-level manifest, two projects that disagree on
/// `Newtonsoft.Json`, and `NuGet.exe` / `NuGet.targets` under `.nuget`.
pub fn legacy_repo() -> RepoFixture {
    RepoFixture::new()
        .with_file("App.sln", LEGACY_SOLUTION)
        .with_file(".nuget/NuGet.exe", b"MZ")
        .with_file(".nuget/NuGet.targets", "<Project />\n")
        .with_file(
            ".nuget/packages.config",
            packages_config(&[("NUnit.Runners", "2.6.4")]),
        )
        .with_file("src/App/App.csproj", LEGACY_PROJECT)
        .with_file(
            "src/App/packages.config",
            packages_config(&[("Newtonsoft.Json", "6.0.8"), ("Autofac", "3.5.2")]),
        )
        .with_file("src/Lib/Lib.csproj", LEGACY_PROJECT)
        .with_file(
            "src/Lib/packages.config",
            packages_config(&[("Newtonsoft.Json", "7.0.1")]),
        )
}
