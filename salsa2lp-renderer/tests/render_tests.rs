use rstest::rstest;
use salsa2lp_core::types::{DistributionChannel, PackageName, VersionInfo};
use salsa2lp_renderer::{CommitContext, RecipeContext, Renderer};

fn version(v: &str, channel: DistributionChannel) -> VersionInfo {
    VersionInfo::new(v, channel)
}

#[test]
fn recipe_text_matches_build_service_format() {
    let renderer = Renderer::new().expect("renderer");
    let ctx = RecipeContext::new(
        "lomiri",
        &PackageName::from("lomiri-clock-app"),
        &version("4.0.3-1", DistributionChannel::Release),
        "main",
    );
    let text = renderer.render_recipe(&ctx).expect("render");
    assert_eq!(
        text,
        "# git-build-recipe format 0.4 deb-version 4.0.3-1~{revtime}\n\
         lp:~lomiri/+git/lomiri-clock-app main"
    );
}

#[test]
fn recipe_text_is_deterministic() {
    let renderer = Renderer::new().expect("renderer");
    let ctx = RecipeContext::new(
        "lomiri",
        &PackageName::from("pkg"),
        &version("1:2.0~rc1-1", DistributionChannel::PreRelease),
        "main",
    );
    let a = renderer.render_recipe(&ctx).expect("first");
    let b = Renderer::new().expect("second renderer").render_recipe(&ctx).expect("second");
    assert_eq!(a, b);
    assert!(a.contains("1:2.0~rc1-1~{revtime}"), "version is not escaped: {a}");
}

#[rstest]
#[case(DistributionChannel::Release, "release")]
#[case(DistributionChannel::PreRelease, "pre-release")]
fn commit_message_embeds_provenance(#[case] channel: DistributionChannel, #[case] word: &str) {
    let renderer = Renderer::new().expect("renderer");
    let ctx = CommitContext::new(
        "salsa.debian.org",
        &PackageName::from("mypkg"),
        &version("1.2.3-1", channel),
        "0123abcd",
    );
    let msg = renderer.render_commit_message(&ctx).expect("render");
    assert_eq!(
        msg,
        format!("Update from salsa.debian.org: mypkg {word} 1.2.3-1 (commit: 0123abcd)")
    );
    assert!(!msg.ends_with('\n'));
}
