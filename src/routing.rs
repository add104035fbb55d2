use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{HazardZone, Location, Route, RouteAssessment};

/// Scores a fixed route catalog against a hazard box.
///
/// Catalog order is the tie-break order, so two routes with the same cost
/// always resolve to the one listed first.
#[derive(Debug, Clone)]
pub struct RouteEvaluator {
    routes: Vec<Route>,
    penalties: BTreeMap<String, f64>,
}

impl RouteEvaluator {
    pub fn new(routes: Vec<Route>, penalties: BTreeMap<String, f64>) -> Self {
        Self { routes, penalties }
    }

    /// Cheapest route with no waypoint inside the zone, or `None` when every
    /// route crosses it.
    pub fn find_safest_route(
        &self,
        current: &Location,
        destination: &Location,
        hazard_zone: &HazardZone,
    ) -> Option<&str> {
        let assessments = self.evaluate(current, destination, hazard_zone);
        let index = safest_index(&assessments)?;
        Some(self.routes[index].name.as_str())
    }

    pub fn evaluate(
        &self,
        current: &Location,
        destination: &Location,
        hazard_zone: &HazardZone,
    ) -> Vec<RouteAssessment> {
        self.routes
            .iter()
            .map(|route| {
                let hazardous = is_hazardous(route, hazard_zone);
                RouteAssessment {
                    name: route.name.clone(),
                    hazardous,
                    cost: (!hazardous).then(|| self.route_cost(route, current, destination)),
                }
            })
            .collect()
    }

    pub fn route_cost(&self, route: &Route, current: &Location, destination: &Location) -> f64 {
        let penalty = self.penalties.get(&route.name).copied().unwrap_or(0.0);
        path_length(current, &route.waypoints, destination) + penalty
    }
}

/// First clear assessment with the strictly lowest cost.
pub fn select_safest(assessments: &[RouteAssessment]) -> Option<&RouteAssessment> {
    safest_index(assessments).map(|index| &assessments[index])
}

fn safest_index(assessments: &[RouteAssessment]) -> Option<usize> {
    let mut safest: Option<(usize, f64)> = None;

    for (index, assessment) in assessments.iter().enumerate() {
        let Some(cost) = assessment.cost else {
            continue;
        };
        match safest {
            Some((_, best)) if cost.partial_cmp(&best) != Some(Ordering::Less) => {}
            _ => safest = Some((index, cost)),
        }
    }

    safest.map(|(index, _)| index)
}

pub fn is_hazardous(route: &Route, hazard_zone: &HazardZone) -> bool {
    route.waypoints.iter().any(|point| hazard_zone.contains(point))
}

fn path_length(current: &Location, waypoints: &[Location], destination: &Location) -> f64 {
    let (Some(first), Some(last)) = (waypoints.first(), waypoints.last()) else {
        return current.distance_to(destination);
    };

    let legs: f64 = waypoints
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum();

    current.distance_to(first) + legs + last.distance_to(destination)
}
