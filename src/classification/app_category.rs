/// Known application display names per category. Lookup is exact; anything else is "other".
const APP_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "development",
        &[
            "Visual Studio Code",
            "Code",
            "IntelliJ IDEA",
            "PyCharm",
            "WebStorm",
            "Xcode",
            "Terminal",
            "iTerm2",
            "iTerm",
            "Warp",
            "Alacritty",
            "Hyper",
            "Cursor",
        ],
    ),
    (
        "browser",
        &[
            "Google Chrome",
            "Safari",
            "Firefox",
            "Arc",
            "Microsoft Edge",
            "Brave Browser",
            "Opera",
        ],
    ),
    (
        "communication",
        &[
            "Slack",
            "Microsoft Teams",
            "Zoom",
            "Discord",
            "FaceTime",
            "Messages",
            "LINE",
            "Telegram",
        ],
    ),
    (
        "design",
        &[
            "Figma",
            "Sketch",
            "Adobe Photoshop",
            "Adobe Illustrator",
            "Adobe XD",
            "Affinity Designer",
            "Canva",
        ],
    ),
    (
        "documentation",
        &[
            "Notion",
            "Microsoft Word",
            "Google Docs",
            "Pages",
            "Obsidian",
            "Bear",
            "Craft",
        ],
    ),
    (
        "productivity",
        &["Finder", "Preview", "Calendar", "Reminders", "Notes", "Spotlight"],
    ),
    (
        "media",
        &["Spotify", "Music", "YouTube", "VLC", "QuickTime Player"],
    ),
];

pub const OTHER_CATEGORY: &str = "other";

pub fn app_category(app_name: &str) -> &'static str {
    APP_CATEGORIES
        .iter()
        .find(|(_, apps)| apps.contains(&app_name))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER_CATEGORY)
}
