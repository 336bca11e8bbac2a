use std::collections::BTreeMap;

use serde::Serialize;

use crate::artifacts::{FileKind, PrimaryArtifact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxTemplate {
    React,
    Html,
}

/// Configuration handed to the in-browser preview runtime: which template
/// to boot, the import map (react only) and the virtual file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxConfig {
    pub template: SandboxTemplate,
    pub imports: BTreeMap<String, String>,
    pub files: BTreeMap<String, String>,
}

pub const ENTRY_PATH: &str = "./index.tsx";
pub const DEMO_PATH: &str = "./demo.tsx";
pub const HTML_PATH: &str = "./index.html";

/// Entry module for the react template: pulls in the generated demo module
/// and the tailwind runtime, re-exporting the demo as default.
const REACT_ENTRY: &str = "import Demo from './demo.tsx'\nimport \"@tailwindcss/browser\"\n\nexport default Demo";

/// Module registry for the react template, each specifier pinned to an
/// exact esm.sh URL. Static configuration, not computed.
const REACT_IMPORTS: &[(&str, &str)] = &[
    // Core React
    ("react", "https://esm.sh/react@^19.0.0"),
    ("react/", "https://esm.sh/react@^19.0.0/"),
    ("react-dom", "https://esm.sh/react-dom@^19.0.0"),
    ("react-dom/", "https://esm.sh/react-dom@^19.0.0/"),
    // UI libraries
    ("lucide-react", "https://esm.sh/lucide-react@0.525.0"),
    ("recharts", "https://esm.sh/recharts@3.1.0"),
    ("@headlessui/react", "https://esm.sh/@headlessui/react@2.0.4"),
    ("@heroicons/react", "https://esm.sh/@heroicons/react@2.1.5"),
    // Animation
    ("framer-motion", "https://esm.sh/framer-motion@12.23.6"),
    ("lottie-react", "https://esm.sh/lottie-react@2.4.0"),
    // 3D graphics
    ("three", "https://esm.sh/three@0.178.0"),
    ("@react-three/fiber", "https://esm.sh/@react-three/fiber@9.2.0"),
    ("@react-three/drei", "https://esm.sh/@react-three/drei@10.5.2"),
    // Game development
    ("matter-js", "https://esm.sh/matter-js@0.20.0"),
    ("konva", "https://esm.sh/konva@9.3.22"),
    ("react-konva", "https://esm.sh/react-konva@19.0.7"),
    ("p5", "https://esm.sh/p5@2.0.3"),
    // Utilities
    ("@tailwindcss/browser", "https://esm.sh/@tailwindcss/browser@4.1.11"),
    ("lodash", "https://esm.sh/lodash@4.17.21"),
    ("dayjs", "https://esm.sh/dayjs@1.11.13"),
    ("uuid", "https://esm.sh/uuid@10.0.0"),
];

/// Derive the preview configuration for the chosen artifact.
///
/// tsx/jsx boot the react template with the full import map and two virtual
/// files (fixed entry module + demo module holding the content); anything
/// else boots the html template with the content verbatim at a fixed path.
pub fn build_sandbox(primary: &PrimaryArtifact) -> SandboxConfig {
    match primary.kind {
        FileKind::Tsx | FileKind::Jsx => {
            let imports = REACT_IMPORTS
                .iter()
                .map(|(specifier, url)| (specifier.to_string(), url.to_string()))
                .collect();
            let mut files = BTreeMap::new();
            files.insert(ENTRY_PATH.to_string(), REACT_ENTRY.to_string());
            files.insert(DEMO_PATH.to_string(), primary.content.clone());
            SandboxConfig {
                template: SandboxTemplate::React,
                imports,
                files,
            }
        }
        _ => {
            let mut files = BTreeMap::new();
            files.insert(HTML_PATH.to_string(), primary.content.clone());
            SandboxConfig {
                template: SandboxTemplate::Html,
                imports: BTreeMap::new(),
                files,
            }
        }
    }
}
